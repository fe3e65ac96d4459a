//! FILENAME: core/pivot-query/src/orchestrator.rs
//! Query Orchestrator - lifecycle of one pivot query.
//!
//! Phases: Idle -> Querying -> FirstPageReady -> Settled, with Paginating
//! while a page change is in flight.
//!
//! Every (re)query issues two requests at once: the windowed first page and
//! the unbounded "load all" request for totals. Each result is applied when
//! it arrives, after checking the generation token captured when it was
//! issued. A result from an older generation is dropped.
//!
//! State lives behind a std mutex that is never held across an `.await` or
//! while calling into the data service (which may call back synchronously
//! through its listener).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use pivot_tree::{extend_cells_metadata, Axis, CellsMetadata, TreeNode, TreeService};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::PivotConfig;
use crate::data_service::{
    AllDataInfo, DataService, DataServiceEvent, ListenerId, LoadOptions, PageData,
};
use crate::descriptor::QueryDescriptor;
use crate::error::{QueryError, QueryResult};
use crate::events::{EventBus, PivotEvent, SubscriberId};
use crate::sort::{SortNegotiator, SortSettingsPayload, SortTarget, SortUpdate};
use crate::{log_debug, log_enter, log_error, log_exit, log_info, log_warn};

// ============================================================================
// PUBLIC STATE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryPhase {
    /// No query issued yet.
    Idle,
    /// Waiting for the first page.
    Querying,
    /// First page installed; the "load all" request is still pending.
    FirstPageReady,
    /// A page change is in flight.
    Paginating,
    /// First page installed and totals known.
    Settled,
}

/// Counters reported by the data service. Reset on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCounters {
    pub total_items_count: usize,
    pub loaded_items_count: usize,
    pub total_records_count: usize,
    pub total_columns_count: usize,
    pub columns_count: usize,
    pub limit_reached: bool,
}

/// Monotonic render-progress flags. Only a new query resets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceState {
    pub is_first_page_rendered: bool,
    pub is_grand_total_row_rendered: bool,
    pub is_total_rows_count_rendered: bool,
    pub is_received_rows_count_calculated: bool,
}

/// Serializable view of the orchestrator for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorSnapshot {
    pub phase: QueryPhase,
    pub generation: u64,
    pub descriptor_id: Option<String>,
    pub counters: QueryCounters,
    pub appearance: AppearanceState,
    /// -1 while pagination is disabled.
    pub active_page: i64,
    pub is_loading: bool,
    pub page_loading: bool,
    pub pagination_enabled: bool,
    pub has_grand_total_row: bool,
    pub last_progress_error: Option<String>,
}

// ============================================================================
// INTERNAL STATE
// ============================================================================

struct AttachedService {
    service: Arc<dyn DataService>,
    listener: ListenerId,
}

struct OrchestratorState {
    generation: u64,
    descriptor: Option<QueryDescriptor>,
    first_page_installed: bool,
    /// The first-page request of the current generation is unresolved.
    first_page_pending: bool,
    totals_loaded: bool,
    is_loading: bool,
    page_loading: bool,
    pagination_enabled: bool,
    active_page: i64,
    counters: QueryCounters,
    appearance: AppearanceState,
    first_page_event_sent: bool,
    total_widget_event_sent: bool,
    rows: Option<Arc<TreeService>>,
    columns: Option<Arc<TreeService>>,
    corner: Option<Arc<TreeService>>,
    cells_metadata: Arc<CellsMetadata>,
    /// Grand-total row delivered through the push channel for this query.
    grand_total_row: Option<TreeNode>,
    /// The merged grand total was received before the first page and may
    /// belong to a superseded query.
    grand_total_provisional: bool,
    last_empty: Option<bool>,
    last_progress_error: Option<String>,
    attached: Option<AttachedService>,
}

impl OrchestratorState {
    fn new() -> Self {
        OrchestratorState {
            generation: 0,
            descriptor: None,
            first_page_installed: false,
            first_page_pending: false,
            totals_loaded: false,
            is_loading: false,
            page_loading: false,
            pagination_enabled: false,
            active_page: -1,
            counters: QueryCounters::default(),
            appearance: AppearanceState::default(),
            first_page_event_sent: false,
            total_widget_event_sent: false,
            rows: None,
            columns: None,
            corner: None,
            cells_metadata: Arc::new(CellsMetadata::default()),
            grand_total_row: None,
            grand_total_provisional: false,
            last_empty: None,
            last_progress_error: None,
            attached: None,
        }
    }

    fn phase(&self) -> QueryPhase {
        if self.generation == 0 {
            QueryPhase::Idle
        } else if !self.first_page_installed {
            QueryPhase::Querying
        } else if self.page_loading {
            QueryPhase::Paginating
        } else if !self.totals_loaded {
            QueryPhase::FirstPageReady
        } else {
            QueryPhase::Settled
        }
    }

    fn reset_appearance(&mut self) {
        self.appearance = AppearanceState::default();
        self.first_page_event_sent = false;
        self.total_widget_event_sent = false;
    }

    /// Starts a new generation. Installed trees stay visible until the new
    /// first page replaces them.
    fn begin_query(&mut self, descriptor: QueryDescriptor) -> u64 {
        self.generation += 1;
        self.descriptor = Some(descriptor);
        self.first_page_installed = false;
        self.first_page_pending = true;
        self.totals_loaded = false;
        self.is_loading = true;
        self.page_loading = false;
        self.pagination_enabled = false;
        self.active_page = -1;
        self.counters = QueryCounters::default();
        self.grand_total_row = None;
        self.grand_total_provisional = false;
        self.last_progress_error = None;
        self.reset_appearance();
        self.generation
    }

    fn grand_total_applicable(&self) -> bool {
        self.pagination_enabled
            && self
                .descriptor
                .as_ref()
                .map_or(false, QueryDescriptor::expects_grand_total_row)
    }

    /// Pushes `TotalWidgetRendered` once every applicable flag is set.
    fn check_settled(&mut self, events: &mut Vec<PivotEvent>) {
        let a = &self.appearance;
        let ready = a.is_first_page_rendered
            && a.is_total_rows_count_rendered
            && a.is_received_rows_count_calculated
            && (a.is_grand_total_row_rendered || !self.grand_total_applicable());
        if ready && !self.total_widget_event_sent {
            self.total_widget_event_sent = true;
            events.push(PivotEvent::TotalWidgetRendered);
        }
    }

    fn total_height(&self, row_height: f64) -> f64 {
        let rows = self.rows.as_ref().map_or(0, |r| r.get_tree_child_length());
        let header = self.columns.as_ref().map_or(0, |c| c.get_tree_deeps_length());
        (rows + header) as f64 * row_height
    }

    /// Events following any change of the installed rows tree.
    fn push_size_events(&mut self, config: &PivotConfig, events: &mut Vec<PivotEvent>) {
        let is_empty = self.rows.as_ref().map_or(true, |r| r.is_empty());
        if self.last_empty != Some(is_empty) {
            self.last_empty = Some(is_empty);
            events.push(PivotEvent::EmptyChange(is_empty));
        }
        if config.emit_height_changes {
            events.push(PivotEvent::TotalHeightChange(self.total_height(config.row_height)));
        }
    }

    /// Appends the stored grand-total row to a freshly loaded rows tree and
    /// covers its cells in `metadata`.
    fn merge_grand_total(
        &self,
        rows: &mut TreeService,
        columns: Option<&TreeService>,
        metadata: &mut CellsMetadata,
    ) {
        if !self.pagination_enabled || rows.has_grand_totals() {
            return;
        }
        if let Some(total) = &self.grand_total_row {
            let from_row = rows.get_tree_child_length();
            rows.extend(total.clone());
            if let Some(columns) = columns {
                extend_cells_metadata(metadata, rows, columns, from_row);
            }
        }
    }
}

/// Destroys a tree service nobody else holds.
fn release(service: Option<Arc<TreeService>>) {
    if let Some(service) = service {
        if let Ok(service) = Arc::try_unwrap(service) {
            service.destroy();
        }
    }
}

struct Shared {
    config: PivotConfig,
    state: Mutex<OrchestratorState>,
    events: EventBus,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(attached) = state.attached.take() {
            attached.service.remove_listener(attached.listener);
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Coordinates one data service and republishes its results to a renderer.
/// Clones share state.
#[derive(Clone)]
pub struct QueryOrchestrator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for QueryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOrchestrator")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl QueryOrchestrator {
    pub fn new(config: PivotConfig) -> Self {
        QueryOrchestrator {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(OrchestratorState::new()),
                events: EventBus::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_all(&self, events: Vec<PivotEvent>) {
        for event in events {
            self.shared.events.emit(event);
        }
    }

    pub fn config(&self) -> &PivotConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> (SubscriberId, UnboundedReceiver<PivotEvent>) {
        self.shared.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    // ------------------------------------------------------------------------
    // Data service attachment
    // ------------------------------------------------------------------------

    /// Makes `service` the active data service.
    ///
    /// The previous service's listener is removed first, then the appearance
    /// state is optionally reset, then the listener is registered on the new
    /// service. Attaching the service that is already active does nothing.
    pub fn set_data_service(&self, service: Arc<dyn DataService>, reset_appearance: bool) {
        log_enter!("SERVICE", "set_data_service", "reset={}", reset_appearance);

        let previous = {
            let mut state = self.state();
            let same = state
                .attached
                .as_ref()
                .map_or(false, |a| same_service(&a.service, &service));
            if same {
                log_debug!("SERVICE", "data service already attached");
                return;
            }
            state.attached.take()
        };

        if let Some(previous) = previous {
            previous.service.remove_listener(previous.listener);
            log_debug!("SERVICE", "unregistered listener {}", previous.listener);
        }

        if reset_appearance {
            self.state().reset_appearance();
        }

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let listener = service.add_listener(Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                QueryOrchestrator { shared }.handle_service_event(event);
            }
        }));

        self.state().attached = Some(AttachedService { service, listener });
        log_exit!("SERVICE", "set_data_service", "listener={}", listener);
    }

    /// Unregisters from the active data service. Safe to call repeatedly.
    pub fn detach(&self) {
        let attached = self.state().attached.take();
        if let Some(attached) = attached {
            attached.service.remove_listener(attached.listener);
            log_info!("SERVICE", "detached listener {}", attached.listener);
        }
    }

    fn data_service(&self) -> QueryResult<Arc<dyn DataService>> {
        self.state()
            .attached
            .as_ref()
            .map(|a| Arc::clone(&a.service))
            .ok_or(QueryError::MissingDataService)
    }

    // ------------------------------------------------------------------------
    // Querying
    // ------------------------------------------------------------------------

    /// Runs a new query: resets counters and readiness, then loads the first
    /// page and the totals concurrently.
    ///
    /// Resolves once both requests settle. Results superseded by a later call
    /// are dropped and reported as `Ok`. Transport and query failures are
    /// returned; loading flags then stay as they were.
    pub async fn update_jaql(&self, descriptor: QueryDescriptor) -> QueryResult<()> {
        log_enter!("QUERY", "update_jaql", "id={}", descriptor.id);

        let (service, generation) = {
            let mut state = self.state();
            let duplicate = state.first_page_pending
                && state.descriptor.as_ref().map(|d| d.id.as_str()) == Some(descriptor.id.as_str());
            if duplicate {
                log_debug!("QUERY", "duplicate query {} ignored", descriptor.id);
                return Ok(());
            }
            let service = state
                .attached
                .as_ref()
                .map(|a| Arc::clone(&a.service))
                .ok_or(QueryError::MissingDataService)?;
            (service, state.begin_query(descriptor.clone()))
        };
        self.emit_all(vec![PivotEvent::QueryStart, PivotEvent::LoadingStart]);

        let options = LoadOptions {
            page_size: Some(self.shared.config.page_size),
            is_paginated: self.shared.config.is_paginated,
        };
        let (page, totals) = tokio::join!(
            self.load_first_page(service.as_ref(), &descriptor, options, generation),
            self.load_totals(service.as_ref(), generation),
        );

        let result = page.and(totals);
        log_exit!("QUERY", "update_jaql", "generation={} ok={}", generation, result.is_ok());
        result
    }

    async fn load_first_page(
        &self,
        service: &dyn DataService,
        descriptor: &QueryDescriptor,
        options: LoadOptions,
        generation: u64,
    ) -> QueryResult<()> {
        match service.load_data(descriptor, options).await {
            Ok(data) => {
                self.install_first_page(generation, data);
                Ok(())
            }
            Err(e) if e.is_stale() => {
                self.end_first_page_request(generation);
                log_debug!("QUERY", "first page of generation {} canceled", generation);
                Ok(())
            }
            Err(e) => {
                if self.end_first_page_request(generation) {
                    log_error!("QUERY", "first page failed: {}", e);
                    Err(e)
                } else {
                    log_debug!("QUERY", "superseded first page failed: {}", e);
                    Ok(())
                }
            }
        }
    }

    async fn load_totals(&self, service: &dyn DataService, generation: u64) -> QueryResult<()> {
        match service.load_all_data().await {
            Ok(info) => {
                self.apply_totals(generation, info);
                Ok(())
            }
            Err(e) if e.is_stale() => {
                log_debug!("TOTALS", "totals of generation {} canceled", generation);
                Ok(())
            }
            Err(e) => {
                if self.is_current(generation) {
                    log_error!("TOTALS", "load all failed: {}", e);
                    Err(e)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state().generation == generation
    }

    /// Marks the first-page request of `generation` as resolved without an
    /// install. Returns false for a superseded generation.
    fn end_first_page_request(&self, generation: u64) -> bool {
        let mut state = self.state();
        if state.generation != generation {
            return false;
        }
        state.first_page_pending = false;
        true
    }

    fn install_first_page(&self, generation: u64, data: PageData) {
        let mut events = Vec::new();
        let replaced = {
            let mut state = self.state();
            if state.generation != generation {
                log_debug!(
                    "QUERY",
                    "dropping stale first page (generation {} < {})",
                    generation,
                    state.generation
                );
                return;
            }

            state.pagination_enabled = self.shared.config.is_paginated && !data.is_last_page;
            state.active_page = if state.pagination_enabled { 0 } else { -1 };

            let mut rows = data.rows;
            let mut cells_metadata = data.cells_metadata;
            state.merge_grand_total(&mut rows, Some(&data.columns), &mut cells_metadata);
            let replaced = (
                state.rows.replace(Arc::new(rows)),
                state.columns.replace(Arc::new(data.columns)),
                state.corner.replace(Arc::new(data.corner)),
            );
            state.cells_metadata = Arc::new(cells_metadata);
            state.first_page_installed = true;
            state.first_page_pending = false;
            state.is_loading = false;

            log_info!(
                "QUERY",
                "first page installed: {} rows, paginated={}",
                state.rows.as_ref().map_or(0, |r| r.get_tree_child_length()),
                state.pagination_enabled
            );

            events.push(PivotEvent::LoadingEnd);
            events.push(PivotEvent::QueryEnd);
            state.push_size_events(&self.shared.config, &mut events);
            replaced
        };

        release(replaced.0);
        release(replaced.1);
        release(replaced.2);
        self.emit_all(events);
    }

    fn apply_totals(&self, generation: u64, info: AllDataInfo) {
        let mut events = Vec::new();
        {
            let mut state = self.state();
            if state.generation != generation {
                log_debug!("TOTALS", "dropping stale totals of generation {}", generation);
                return;
            }
            let counters = &mut state.counters;
            counters.total_items_count = info.total_items_count;
            counters.loaded_items_count = info.loaded_rows_count;
            counters.total_records_count = info.total_records_count;
            counters.limit_reached = info.limit_reached;
            if let Some(columns) = info.columns_count {
                counters.columns_count = columns;
            }
            if let Some(total) = info.total_columns_count {
                counters.total_columns_count = total;
            }
            state.totals_loaded = true;
            state.appearance.is_total_rows_count_rendered = true;
            state.appearance.is_received_rows_count_calculated = true;
            log_info!(
                "TOTALS",
                "totals: {} items, {} loaded, limit={}",
                info.total_items_count,
                info.loaded_rows_count,
                info.limit_reached
            );
            state.check_settled(&mut events);
        }
        self.emit_all(events);
    }

    // ------------------------------------------------------------------------
    // Pagination
    // ------------------------------------------------------------------------

    /// Loads another page of rows. Dropped silently while another page is
    /// loading or when pagination is disabled. Only the rows tree is swapped.
    pub async fn load_page_data(&self, page: usize) -> QueryResult<()> {
        log_enter!("PAGE", "load_page_data", "page={}", page);

        let (service, generation) = {
            let mut state = self.state();
            if !state.pagination_enabled {
                log_debug!("PAGE", "pagination disabled, page {} ignored", page);
                return Ok(());
            }
            if state.page_loading {
                log_debug!("PAGE", "page load in flight, page {} dropped", page);
                return Ok(());
            }
            let service = state
                .attached
                .as_ref()
                .map(|a| Arc::clone(&a.service))
                .ok_or(QueryError::MissingDataService)?;
            state.page_loading = true;
            (service, state.generation)
        };
        self.emit_all(vec![PivotEvent::LoadingStart]);

        let data = match service
            .get_selected_page_data(page, self.shared.config.page_size)
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_stale() => {
                let mut state = self.state();
                if state.generation == generation {
                    state.page_loading = false;
                }
                log_debug!("PAGE", "page {} canceled", page);
                return Ok(());
            }
            Err(e) => {
                if !self.is_current(generation) {
                    return Ok(());
                }
                log_error!("PAGE", "page {} failed: {}", page, e);
                return Err(e);
            }
        };

        let mut events = Vec::new();
        let replaced = {
            let mut state = self.state();
            if state.generation != generation {
                log_debug!("PAGE", "dropping stale page {}", page);
                return Ok(());
            }
            let mut rows = data.rows;
            let mut cells_metadata = data.cells_metadata;
            state.merge_grand_total(&mut rows, state.columns.as_deref(), &mut cells_metadata);
            let replaced = state.rows.replace(Arc::new(rows));
            state.cells_metadata = Arc::new(cells_metadata);
            state.page_loading = false;
            state.active_page = page as i64;

            events.push(PivotEvent::PageChange(page));
            events.push(PivotEvent::LoadingEnd);
            state.push_size_events(&self.shared.config, &mut events);
            replaced
        };

        release(replaced);
        self.emit_all(events);
        log_exit!("PAGE", "load_page_data", "page={}", page);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Grand totals
    // ------------------------------------------------------------------------

    /// Merges a separately delivered grand-total row into the installed rows
    /// tree. Skipped when pagination is disabled, because the row then
    /// arrives pre-merged with the data.
    pub fn on_grand_chunk_received(&self, total: TreeNode) {
        let mut events = Vec::new();
        {
            let mut state = self.state();
            if state.first_page_installed && !state.pagination_enabled {
                log_debug!("TOTALS", "grand total pre-merged, chunk skipped");
                return;
            }
            // Trees of the previous query may still be on screen, so a row
            // received now is kept for the install but stays replaceable.
            if !state.first_page_installed {
                state.grand_total_row = Some(total);
                state.grand_total_provisional = true;
                return;
            }

            let st = &mut *state;
            let Some(rows) = st.rows.as_mut() else {
                return;
            };
            let from_row = if !rows.has_grand_totals() {
                let from_row = rows.get_tree_child_length();
                Arc::make_mut(rows).extend(total.clone());
                log_info!("TOTALS", "grand total row merged");
                from_row
            } else if st.grand_total_provisional {
                let from_row = Arc::make_mut(rows).replace_grand_total(total.clone());
                log_info!("TOTALS", "early grand total row replaced");
                from_row
            } else {
                log_debug!("TOTALS", "grand total already merged, chunk ignored");
                return;
            };
            st.grand_total_row = Some(total);
            st.grand_total_provisional = false;
            if let Some(columns) = st.columns.as_deref() {
                extend_cells_metadata(Arc::make_mut(&mut st.cells_metadata), &**rows, columns, from_row);
            }
            state.push_size_events(&self.shared.config, &mut events);
        }
        self.emit_all(events);
    }

    // ------------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------------

    /// Called by the renderer after each paint of the current trees.
    pub fn notify_rendered(&self) {
        let mut events = vec![PivotEvent::DomReady];
        {
            let mut state = self.state();
            if state.first_page_installed {
                state.appearance.is_first_page_rendered = true;
                if !state.first_page_event_sent {
                    state.first_page_event_sent = true;
                    events.push(PivotEvent::FirstPageRendered);
                }
                state.check_settled(&mut events);
            }
        }
        self.emit_all(events);
    }

    /// Called by the renderer once the grand-total row has been painted.
    pub fn notify_grand_total_rendered(&self) {
        let mut events = Vec::new();
        {
            let mut state = self.state();
            let merged = state.rows.as_ref().map_or(false, |r| r.has_grand_totals());
            if !merged {
                log_warn!("TOTALS", "grand total reported rendered before it was merged");
                return;
            }
            state.appearance.is_grand_total_row_rendered = true;
            state.check_settled(&mut events);
        }
        self.emit_all(events);
    }

    // ------------------------------------------------------------------------
    // Push events
    // ------------------------------------------------------------------------

    fn handle_service_event(&self, event: DataServiceEvent) {
        match event {
            DataServiceEvent::GrandTotalRow(total) => self.on_grand_chunk_received(total),
            DataServiceEvent::DataChunkProgress(count) => {
                self.state().counters.loaded_items_count = count;
            }
            DataServiceEvent::TotalRowsCount {
                rows_count,
                query_rows_count,
                limit_reached,
            } => {
                let mut events = Vec::new();
                {
                    let mut state = self.state();
                    state.counters.total_items_count = rows_count;
                    state.counters.total_records_count = query_rows_count;
                    state.counters.limit_reached = limit_reached;
                    state.appearance.is_total_rows_count_rendered = true;
                    state.check_settled(&mut events);
                }
                self.emit_all(events);
            }
            DataServiceEvent::TotalColumnsCount {
                columns_count,
                total_columns_count,
            } => {
                let mut state = self.state();
                state.counters.columns_count = columns_count;
                state.counters.total_columns_count = total_columns_count;
            }
            DataServiceEvent::ProgressError(message) => {
                log_error!("QUERY", "progress error: {}", message);
                self.state().last_progress_error = Some(message);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------------

    /// Negotiates the sort editor for a click on a header cell and emits
    /// `SortingSettingsChanged`. Returns `None` (and emits nothing) when the
    /// cell cannot be sorted or no trees are installed.
    ///
    /// # Panics
    /// Panics when the cell lies outside the tree's grid.
    pub fn on_sort_click(&self, axis: Axis, row: usize, col: usize) -> Option<SortSettingsPayload> {
        let (tree, stored, service) = {
            let state = self.state();
            let tree = match axis {
                Axis::Rows => state.rows.clone(),
                Axis::Columns => state.columns.clone(),
                Axis::Corner => state.corner.clone(),
            };
            (
                tree,
                state.descriptor.clone(),
                state.attached.as_ref().map(|a| Arc::clone(&a.service)),
            )
        };
        let tree = tree?;

        let (descriptor, is_single_row_tree) = match &service {
            Some(service) => (service.get_jaql().or(stored), service.is_single_row_tree()),
            None => {
                let single = self
                    .rows_service()
                    .map_or(false, |r| r.get_tree_deeps_length() == 1);
                (stored, single)
            }
        };
        let descriptor = descriptor?;

        let target = SortTarget::at(&tree, row, col);
        let payload = SortNegotiator::negotiate(&target, &descriptor, is_single_row_tree);
        match &payload {
            Some(payload) => {
                log_info!(
                    "SORT",
                    "{:?} sort for item {}",
                    payload.kind,
                    payload.settings.item_index
                );
                self.emit_all(vec![PivotEvent::SortingSettingsChanged(payload.clone())]);
            }
            None => log_debug!("SORT", "cell ({}, {}) of {:?} is not sortable", row, col, axis),
        }
        payload
    }

    /// Forwards a sort change to the query layer.
    pub fn update_sort(&self, update: SortUpdate) {
        log_info!("SORT", "sort update for item {}", update.item_index);
        self.emit_all(vec![PivotEvent::SortUpdate(update)]);
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn rows_service(&self) -> Option<Arc<TreeService>> {
        self.state().rows.clone()
    }

    pub fn columns_service(&self) -> Option<Arc<TreeService>> {
        self.state().columns.clone()
    }

    pub fn corner_service(&self) -> Option<Arc<TreeService>> {
        self.state().corner.clone()
    }

    pub fn cells_metadata(&self) -> Arc<CellsMetadata> {
        Arc::clone(&self.state().cells_metadata)
    }

    pub fn descriptor(&self) -> Option<QueryDescriptor> {
        self.state().descriptor.clone()
    }

    pub fn has_data_service(&self) -> bool {
        self.data_service().is_ok()
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        let state = self.state();
        OrchestratorSnapshot {
            phase: state.phase(),
            generation: state.generation,
            descriptor_id: state.descriptor.as_ref().map(|d| d.id.clone()),
            counters: state.counters,
            appearance: state.appearance,
            active_page: state.active_page,
            is_loading: state.is_loading,
            page_loading: state.page_loading,
            pagination_enabled: state.pagination_enabled,
            has_grand_total_row: state.rows.as_ref().map_or(false, |r| r.has_grand_totals()),
            last_progress_error: state.last_progress_error.clone(),
        }
    }
}

fn same_service(a: &Arc<dyn DataService>, b: &Arc<dyn DataService>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
