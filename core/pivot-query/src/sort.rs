//! FILENAME: core/pivot-query/src/sort.rs
//! Sort Negotiation - maps a header click to a sort-settings payload.
//!
//! The negotiator never touches trees or issues reloads. It reads the clicked
//! node, its metadata and the last query's panel items, and decides which
//! sort editor to offer:
//! - simple: the clicked rows item sorts by itself, or the rows axis has a
//!   single grouping level
//! - complex: sorting a rows item by a measure (optionally under a column path)

use pivot_tree::{Axis, TreeNode, TreeNodeMetadata, TreeService, UserType};
use serde::{Deserialize, Serialize};

use crate::descriptor::{Panel, QueryDescriptor, SortDetails, SortDirection};

// ============================================================================
// TYPES
// ============================================================================

/// The header cell a sort interaction targets.
#[derive(Debug, Clone)]
pub struct SortTarget<'a> {
    pub axis: Axis,
    /// Ancestors of the clicked node, outermost first, ending with the node.
    pub path: Vec<&'a TreeNode>,
    pub metadata: TreeNodeMetadata,
}

impl<'a> SortTarget<'a> {
    /// Resolves the node and metadata at a display cell of `service`.
    ///
    /// # Panics
    /// Panics when the cell lies outside the service grid.
    pub fn at(service: &'a TreeService, row: usize, col: usize) -> Self {
        SortTarget {
            axis: service.axis(),
            path: service.get_node_path(row, col),
            metadata: service.get_metadata(row, col, None),
        }
    }

    pub fn node(&self) -> Option<&'a TreeNode> {
        self.path.last().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortEditorKind {
    Simple,
    Complex,
}

/// What the sort editor edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSettings {
    /// Metadata index of the rows item being sorted.
    pub item_index: usize,
    pub title: String,
    pub dir: Option<SortDirection>,
    /// Metadata index of the measure the rows are ordered by, for
    /// measure-driven sorts.
    pub measure_index: Option<usize>,
    pub measure_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSettingsPayload {
    #[serde(rename = "type")]
    pub kind: SortEditorKind,
    pub settings: SortSettings,
    pub sort_details: SortDetails,
    pub is_single_row_tree: bool,
}

/// A sort change for the external query layer to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortUpdate {
    pub item_index: usize,
    pub sort_details: SortDetails,
}

// ============================================================================
// NEGOTIATION
// ============================================================================

pub struct SortNegotiator;

impl SortNegotiator {
    /// Computes the payload for a click, or `None` when the target cannot be
    /// sorted (totals, unknown panels, include-all placeholders).
    pub fn negotiate(
        target: &SortTarget<'_>,
        descriptor: &QueryDescriptor,
        is_single_row_tree: bool,
    ) -> Option<SortSettingsPayload> {
        let node = target.node()?;
        if node.user_type.is_total() {
            return None;
        }
        match target.axis {
            Axis::Rows => {
                Self::negotiate_rows_item(descriptor, target.metadata.min_level, is_single_row_tree)
            }
            Axis::Corner => {
                Self::negotiate_rows_item(descriptor, target.metadata.index, is_single_row_tree)
            }
            Axis::Columns => Self::negotiate_column(target, descriptor, is_single_row_tree),
        }
    }

    fn negotiate_rows_item(
        descriptor: &QueryDescriptor,
        position: usize,
        is_single_row_tree: bool,
    ) -> Option<SortSettingsPayload> {
        let (own_index, item) = descriptor.panel_item(Panel::Rows, position)?;
        if !item.is_sortable() {
            return None;
        }
        let details = item.sort_details.clone().unwrap_or_else(|| SortDetails {
            dir: item.sort.unwrap_or_default(),
            ..Default::default()
        });
        let resolved = details.field.unwrap_or(own_index);
        let measure = (resolved != own_index)
            .then(|| descriptor.metadata.get(resolved))
            .flatten();

        let kind = if resolved == own_index || is_single_row_tree {
            SortEditorKind::Simple
        } else {
            SortEditorKind::Complex
        };

        Some(SortSettingsPayload {
            kind,
            settings: SortSettings {
                item_index: own_index,
                title: item.title.clone(),
                dir: item.sort,
                measure_index: measure.map(|_| resolved),
                measure_title: measure.map(|m| m.title.clone()),
            },
            sort_details: details,
            is_single_row_tree,
        })
    }

    fn negotiate_column(
        target: &SortTarget<'_>,
        descriptor: &QueryDescriptor,
        is_single_row_tree: bool,
    ) -> Option<SortSettingsPayload> {
        let measure_position = match &target.metadata.value_node {
            Some(value_node) => value_node.measure_index?,
            None if descriptor.panel_len(Panel::Measures) == 1 => 0,
            None => return None,
        };
        let (measure_index, measure) = descriptor.panel_item(Panel::Measures, measure_position)?;
        if !measure.is_sortable() {
            return None;
        }

        let rows_len = descriptor.panel_len(Panel::Rows);
        let (item_index, item) = descriptor.panel_item(Panel::Rows, rows_len.checked_sub(1)?)?;
        if !item.is_sortable() {
            return None;
        }

        let measure_path: Vec<String> = target
            .path
            .iter()
            .filter(|n| n.user_type == UserType::Data && n.measure_index().is_none())
            .map(|n| n.value.clone())
            .collect();

        let details = match &item.sort_details {
            Some(current)
                if current.field == Some(measure_index)
                    && current.measure_path.as_deref().unwrap_or_default() == measure_path.as_slice() =>
            {
                current.clone()
            }
            _ => SortDetails {
                field: Some(measure_index),
                dir: SortDirection::default(),
                measure_path: Some(measure_path),
                initialized: false,
            },
        };

        let kind = if is_single_row_tree {
            SortEditorKind::Simple
        } else {
            SortEditorKind::Complex
        };

        Some(SortSettingsPayload {
            kind,
            settings: SortSettings {
                item_index,
                title: item.title.clone(),
                dir: item.sort,
                measure_index: Some(measure_index),
                measure_title: Some(measure.title.clone()),
            },
            sort_details: details,
            is_single_row_tree,
        })
    }
}

/// The update that applies a payload with a new direction.
pub fn sort_update_for(payload: &SortSettingsPayload, dir: SortDirection) -> SortUpdate {
    SortUpdate {
        item_index: payload.settings.item_index,
        sort_details: SortDetails {
            dir,
            initialized: true,
            ..payload.sort_details.clone()
        },
    }
}
