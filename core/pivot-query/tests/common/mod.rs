//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for orchestrator integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pivot_query::{
    AllDataInfo, DataService, DataServiceEvent, DataServiceListener, ListenerId, ListenerRegistry,
    LoadOptions, PageData, Panel, PanelItem, PivotConfig, PivotEvent, QueryDescriptor, QueryError,
    QueryOrchestrator, QueryResult,
};
use pivot_tree::{BuildOptions, CellValue, FlatRecord, PivotBuilder, TreeNode, UserType};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ============================================================================
// SCRIPTED DATA SERVICE
// ============================================================================

type Pending<T> = Mutex<Vec<Option<oneshot::Sender<QueryResult<T>>>>>;

/// Data service whose responses are released by the test, in any order.
/// A request whose sender is dropped resolves as canceled.
#[derive(Default)]
pub struct ScriptedDataService {
    listeners: ListenerRegistry,
    loads: Pending<PageData>,
    totals: Pending<AllDataInfo>,
    pages: Pending<PageData>,
    page_requests: Mutex<Vec<usize>>,
    jaql: Mutex<Option<QueryDescriptor>>,
    single_row_tree: AtomicBool,
}

async fn wait_for<T>(pending: &Pending<T>) -> QueryResult<T> {
    let (tx, rx) = oneshot::channel();
    pending.lock().unwrap().push(Some(tx));
    rx.await.unwrap_or(Err(QueryError::Canceled))
}

fn respond<T>(pending: &Pending<T>, index: usize, result: QueryResult<T>) {
    let tx = pending.lock().unwrap()[index]
        .take()
        .expect("request already answered");
    let _ = tx.send(result);
}

impl ScriptedDataService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    pub fn totals_count(&self) -> usize {
        self.totals.lock().unwrap().len()
    }

    pub fn page_requests(&self) -> Vec<usize> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn set_single_row_tree(&self, value: bool) {
        self.single_row_tree.store(value, Ordering::SeqCst);
    }

    pub fn resolve_load(&self, index: usize, result: QueryResult<PageData>) {
        respond(&self.loads, index, result);
    }

    pub fn resolve_totals(&self, index: usize, result: QueryResult<AllDataInfo>) {
        respond(&self.totals, index, result);
    }

    pub fn resolve_page(&self, index: usize, result: QueryResult<PageData>) {
        respond(&self.pages, index, result);
    }

    pub fn push(&self, event: DataServiceEvent) {
        self.listeners.emit(event);
    }
}

#[async_trait]
impl DataService for ScriptedDataService {
    async fn load_data(&self, descriptor: &QueryDescriptor, _options: LoadOptions) -> QueryResult<PageData> {
        *self.jaql.lock().unwrap() = Some(descriptor.clone());
        wait_for(&self.loads).await
    }

    async fn load_all_data(&self) -> QueryResult<AllDataInfo> {
        wait_for(&self.totals).await
    }

    async fn get_selected_page_data(&self, page: usize, _page_size: usize) -> QueryResult<PageData> {
        self.page_requests.lock().unwrap().push(page);
        wait_for(&self.pages).await
    }

    fn get_jaql(&self) -> Option<QueryDescriptor> {
        self.jaql.lock().unwrap().clone()
    }

    fn is_single_row_tree(&self) -> bool {
        self.single_row_tree.load(Ordering::SeqCst)
    }

    fn add_listener(&self, listener: DataServiceListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Sales data: region / product rows, one revenue measure.
pub struct SalesFixture;

impl SalesFixture {
    pub fn descriptor(id: &str) -> QueryDescriptor {
        QueryDescriptor::new(
            id,
            vec![
                PanelItem::new(Panel::Rows, "Region", "[Sales.Region]"),
                PanelItem::new(Panel::Rows, "Product", "[Sales.Product]"),
                PanelItem::new(Panel::Columns, "Year", "[Sales.Year]"),
                PanelItem::new(Panel::Measures, "Revenue", "[Sales.Revenue]"),
            ],
        )
        .with_grand_totals(true, false)
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64)> {
        vec![
            ("East", "Apples", "2023", 120.0),
            ("East", "Apples", "2024", 140.0),
            ("East", "Pears", "2023", 80.0),
            ("West", "Apples", "2024", 95.0),
            ("West", "Plums", "2023", 60.0),
            ("North", "Pears", "2024", 30.0),
        ]
    }

    /// One page holding the given regions.
    pub fn page(regions: &[&str], is_last_page: bool) -> PageData {
        let mut builder = PivotBuilder::new(BuildOptions {
            measures: vec!["Revenue".to_string()],
            row_titles: vec!["Region".to_string(), "Product".to_string()],
            ..Default::default()
        });
        for (region, product, year, revenue) in Self::data() {
            if regions.contains(&region) {
                builder
                    .push(FlatRecord::data(&[region, product], &[year], vec![CellValue::Number(revenue)]))
                    .unwrap();
            }
        }
        PageData::from_trees(builder.build().unwrap(), is_last_page)
    }

    pub fn grand_total_row() -> TreeNode {
        TreeNode::total(UserType::GrandTotal, "Grand Total")
            .with_data(vec![CellValue::Number(330.0), CellValue::Number(265.0)])
    }

    pub fn totals(total_items: usize) -> AllDataInfo {
        AllDataInfo {
            total_items_count: total_items,
            loaded_rows_count: total_items.min(4),
            total_records_count: total_items * 2,
            limit_reached: false,
            columns_count: Some(2),
            total_columns_count: Some(2),
        }
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub struct TestHarness {
    pub orchestrator: QueryOrchestrator,
    pub service: Arc<ScriptedDataService>,
    pub events: UnboundedReceiver<PivotEvent>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(PivotConfig::default())
    }

    pub fn with_config(config: PivotConfig) -> Self {
        let orchestrator = QueryOrchestrator::new(config);
        let service = ScriptedDataService::new();
        orchestrator.set_data_service(service.clone(), false);
        let (_, events) = orchestrator.subscribe();
        TestHarness {
            orchestrator,
            service,
            events,
        }
    }

    /// Issues `update_jaql` on a spawned task.
    pub fn start_query(&self, descriptor: QueryDescriptor) -> JoinHandle<QueryResult<()>> {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move { orchestrator.update_jaql(descriptor).await })
    }

    pub fn start_page(&self, page: usize) -> JoinHandle<QueryResult<()>> {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move { orchestrator.load_page_data(page).await })
    }

    /// Lets spawned tasks run until they block on the scripted service.
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Runs a query whose first page and totals resolve immediately.
    pub async fn run_query(&mut self, id: &str, page: PageData, totals: AllDataInfo) {
        let loads = self.service.load_count();
        let handle = self.start_query(SalesFixture::descriptor(id));
        self.settle().await;
        self.service.resolve_load(loads, Ok(page));
        self.service.resolve_totals(loads, Ok(totals));
        handle.await.unwrap().unwrap();
    }

    pub fn drain_events(&mut self) -> Vec<PivotEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn count(events: &[PivotEvent], wanted: &PivotEvent) -> usize {
        events.iter().filter(|e| *e == wanted).count()
    }
}
