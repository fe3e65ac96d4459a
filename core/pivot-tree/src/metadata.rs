//! FILENAME: core/pivot-tree/src/metadata.rs
//! Cell Metadata - position classification for header and data cells.
//!
//! Header metadata tells the renderer where a node sits relative to its
//! level and its siblings (border suppression, edge styling) and links it to
//! the measure axis and to its next sibling (sort defaults, grand-total
//! adjacency). Data-cell metadata is produced by the builder per (row, col).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::node::{NodeSummary, UserType};

/// Edge classification of a node along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    First,
    Last,
}

pub type Positions = SmallVec<[Position; 2]>;

/// Metadata of a header node at a given grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeMetadata {
    /// First leaf position of the node.
    pub index: usize,
    pub level: usize,
    pub min_level: usize,
    pub user_type: UserType,
    /// Position relative to the levels of the tree.
    pub levels: Positions,
    /// Position relative to the node's siblings (and the supplied window).
    pub siblings: Positions,
    /// Metadata of the top-level ancestor. `None` for top-level nodes.
    pub root: Option<Box<TreeNodeMetadata>>,
    /// Metadata of the parent. `None` for top-level nodes.
    pub parent: Option<Box<TreeNodeMetadata>>,
    /// The measure header this node resolves to, if the axis carries measures.
    pub value_node: Option<NodeSummary>,
    /// The next sibling, if any.
    pub next_node: Option<NodeSummary>,
}

impl TreeNodeMetadata {
    pub fn is_first_level(&self) -> bool {
        self.levels.contains(&Position::First)
    }

    pub fn is_last_level(&self) -> bool {
        self.levels.contains(&Position::Last)
    }

    pub fn is_first_sibling(&self) -> bool {
        self.siblings.contains(&Position::First)
    }

    pub fn is_last_sibling(&self) -> bool {
        self.siblings.contains(&Position::Last)
    }

    /// True when the next sibling is a grand total.
    pub fn is_before_grand_total(&self) -> bool {
        self.next_node
            .as_ref()
            .map_or(false, |n| n.user_type == UserType::GrandTotal)
    }
}

/// Metadata of a data-area cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMetadata {
    pub row_type: UserType,
    pub column_type: UserType,
    pub measure_index: Option<usize>,
}

/// Data-cell metadata keyed by (row, col) leaf positions.
pub type CellsMetadata = FxHashMap<(u32, u32), CellMetadata>;
