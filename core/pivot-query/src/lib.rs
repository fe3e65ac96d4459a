//! FILENAME: core/pivot-query/src/lib.rs
//! Pivot query orchestration.
//!
//! Drives one external data service through the lifecycle of a pivot query
//! and republishes its results to a rendering consumer:
//! - `orchestrator`: first page, pages, totals, grand-total merge, readiness
//! - `sort`: header-click to sort-settings negotiation
//! - `data_service`: the boundary trait implemented by the query layer
//! - `events`: typed consumer channel
//! - `config`, `error`, `logging`: ambient plumbing

pub mod logging;

pub mod config;
pub mod data_service;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod sort;

pub use config::{ConfigError, PivotConfig};
pub use data_service::{
    AllDataInfo, DataService, DataServiceEvent, DataServiceListener, ListenerId, ListenerRegistry,
    LoadOptions, PageData,
};
pub use descriptor::{GrandTotals, Panel, PanelItem, QueryDescriptor, SortDetails, SortDirection};
pub use error::{QueryError, QueryResult};
pub use events::{EventBus, PivotEvent, SubscriberId};
pub use logging::{init_log_file, next_seq, write_log};
pub use orchestrator::{
    AppearanceState, OrchestratorSnapshot, QueryCounters, QueryOrchestrator, QueryPhase,
};
pub use sort::{
    sort_update_for, SortEditorKind, SortNegotiator, SortSettings, SortSettingsPayload, SortTarget,
    SortUpdate,
};
