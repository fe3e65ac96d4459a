//! FILENAME: core/pivot-query/src/data_service.rs
//! Data Service boundary - the external collaborator that executes queries
//! and builds tree services from their results.
//!
//! Two channels cross this boundary:
//! - request/response: `load_data`, `load_all_data`, `get_selected_page_data`
//! - push: `DataServiceEvent`s delivered to registered listeners

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use pivot_tree::{CellsMetadata, PivotTrees, TreeNode, TreeService};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::descriptor::QueryDescriptor;
use crate::error::QueryResult;

// ============================================================================
// PAYLOADS
// ============================================================================

/// Trees of one loaded page.
#[derive(Debug, Clone)]
pub struct PageData {
    pub rows: TreeService,
    pub columns: TreeService,
    pub corner: TreeService,
    pub is_last_page: bool,
    pub cells_metadata: CellsMetadata,
}

impl PageData {
    pub fn from_trees(trees: PivotTrees, is_last_page: bool) -> Self {
        PageData {
            rows: trees.rows,
            columns: trees.columns,
            corner: trees.corner,
            is_last_page,
            cells_metadata: trees.cells_metadata,
        }
    }
}

/// Counts reported by the unbounded "load all" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllDataInfo {
    pub total_items_count: usize,
    pub loaded_rows_count: usize,
    pub total_records_count: usize,
    pub limit_reached: bool,
    #[serde(default)]
    pub columns_count: Option<usize>,
    #[serde(default)]
    pub total_columns_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    pub page_size: Option<usize>,
    pub is_paginated: bool,
}

/// Push notifications from a data service, independent of any request.
#[derive(Debug, Clone)]
pub enum DataServiceEvent {
    /// Number of rows received so far.
    DataChunkProgress(usize),
    /// The grand-total row, delivered apart from the paged rows.
    GrandTotalRow(TreeNode),
    TotalRowsCount {
        rows_count: usize,
        query_rows_count: usize,
        limit_reached: bool,
    },
    TotalColumnsCount {
        columns_count: usize,
        total_columns_count: usize,
    },
    ProgressError(String),
}

pub type ListenerId = u64;

pub type DataServiceListener = Arc<dyn Fn(DataServiceEvent) + Send + Sync>;

// ============================================================================
// SERVICE TRAIT
// ============================================================================

#[async_trait]
pub trait DataService: Send + Sync {
    /// Loads the first (or only) page for a descriptor.
    async fn load_data(&self, descriptor: &QueryDescriptor, options: LoadOptions) -> QueryResult<PageData>;

    /// Runs the unbounded request that yields totals and limits.
    async fn load_all_data(&self) -> QueryResult<AllDataInfo>;

    async fn get_selected_page_data(&self, page: usize, page_size: usize) -> QueryResult<PageData>;

    /// Descriptor of the last query this service ran.
    fn get_jaql(&self) -> Option<QueryDescriptor>;

    /// True when the rows axis has exactly one grouping level.
    fn is_single_row_tree(&self) -> bool;

    fn add_listener(&self, listener: DataServiceListener) -> ListenerId;

    /// Unregisters a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}

// ============================================================================
// LISTENER REGISTRY
// ============================================================================

/// Listener bookkeeping for `DataService` implementations.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: ListenerId,
    listeners: FxHashMap<ListenerId, DataServiceListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: DataServiceListener) -> ListenerId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.listeners.insert(id, listener);
        id
    }

    /// Returns false when the id was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers an event to every listener, in registration order. Listeners
    /// run outside the registry lock so they may unregister themselves.
    pub fn emit(&self, event: DataServiceEvent) {
        let mut listeners: Vec<(ListenerId, DataServiceListener)> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .listeners
                .iter()
                .map(|(id, l)| (*id, Arc::clone(l)))
                .collect()
        };
        listeners.sort_by_key(|(id, _)| *id);
        for (_, listener) in listeners {
            listener(event.clone());
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
