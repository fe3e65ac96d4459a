//! FILENAME: core/pivot-tree/src/lib.rs
//! Pivot header trees.
//!
//! This crate turns flat, grouped query results into hierarchical header
//! trees and exposes them as a rectangular, mergeable grid that a
//! virtualized renderer can index cell by cell. It performs no I/O.
//!
//! Layers:
//! - `node`: Value objects (what a header position IS)
//! - `builder`: Tree construction from flat records (HOW trees are grown)
//! - `layout`: Cached flattening into placements and a dense cell index
//! - `service`: Read access, spans, snapping, partial extraction, extension
//! - `metadata`: Per-cell position metadata used for borders and sorting

pub mod error;
pub mod node;
pub mod metadata;
pub mod builder;
mod layout;
pub mod service;

pub use error::BuildError;
pub use node::*;
pub use metadata::*;
pub use builder::{
    extend_cells_metadata, BuildOptions, FlatRecord, GroupingMode, PivotBuilder, PivotTrees,
    TreeBuilder,
};
pub use service::{Axis, CellOffsets, CellSpans, Grid, GridCell, TreeService};
