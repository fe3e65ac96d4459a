//! FILENAME: core/pivot-query/src/descriptor.rs
//! Query Descriptor - the opaque request handed to the data service.
//!
//! The orchestrator only looks at the descriptor id (duplicate guard), the
//! grand-total flags (readiness) and the panel items (sort negotiation).

use serde::{Deserialize, Serialize};

/// Which pivot area a metadata item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Panel {
    Rows,
    Columns,
    Measures,
    Filters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Sort state of a rows item, as stored in the query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortDetails {
    /// Metadata index of the item the sort applies to. `None` means the
    /// item itself.
    pub field: Option<usize>,
    pub dir: SortDirection,
    /// Column values leading to the measure being sorted by (complex sort).
    pub measure_path: Option<Vec<String>>,
    /// Set once the user touched the sort; untouched details carry defaults.
    pub initialized: bool,
}

/// One entry of the query metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelItem {
    pub panel: Panel,
    pub title: String,
    /// Underlying field. `None` for include-all placeholders.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub sort: Option<SortDirection>,
    #[serde(default)]
    pub sort_details: Option<SortDetails>,
}

impl PanelItem {
    pub fn new(panel: Panel, title: impl Into<String>, field: impl Into<String>) -> Self {
        PanelItem {
            panel,
            title: title.into(),
            field: Some(field.into()),
            sort: None,
            sort_details: None,
        }
    }

    /// An item without an underlying field.
    pub fn include_all(panel: Panel, title: impl Into<String>) -> Self {
        PanelItem {
            field: None,
            ..PanelItem::new(panel, title, "")
        }
    }

    pub fn with_sort_details(mut self, details: SortDetails) -> Self {
        self.sort = Some(details.dir);
        self.sort_details = Some(details);
        self
    }

    pub fn is_sortable(&self) -> bool {
        self.field.as_deref().map_or(false, |f| !f.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrandTotals {
    pub rows: bool,
    pub columns: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryDescriptor {
    /// Identity used to detect duplicate submissions.
    pub id: String,
    pub metadata: Vec<PanelItem>,
    pub grand_totals: GrandTotals,
}

impl QueryDescriptor {
    pub fn new(id: impl Into<String>, metadata: Vec<PanelItem>) -> Self {
        QueryDescriptor {
            id: id.into(),
            metadata,
            grand_totals: GrandTotals::default(),
        }
    }

    pub fn with_grand_totals(mut self, rows: bool, columns: bool) -> Self {
        self.grand_totals = GrandTotals { rows, columns };
        self
    }

    /// Items of one panel with their metadata index, in panel order.
    pub fn panel_items(&self, panel: Panel) -> impl Iterator<Item = (usize, &PanelItem)> + '_ {
        self.metadata
            .iter()
            .enumerate()
            .filter(move |(_, item)| item.panel == panel)
    }

    /// The `position`-th item of a panel.
    pub fn panel_item(&self, panel: Panel, position: usize) -> Option<(usize, &PanelItem)> {
        self.panel_items(panel).nth(position)
    }

    pub fn panel_len(&self, panel: Panel) -> usize {
        self.panel_items(panel).count()
    }

    /// True when a grand-total row is expected, which the fully-settled
    /// readiness signal waits for.
    pub fn expects_grand_total_row(&self) -> bool {
        self.grand_totals.rows && self.panel_len(Panel::Rows) > 0
    }
}
