//! FILENAME: core/pivot-query/src/events.rs
//! Orchestrator-to-consumer events.
//!
//! Consumers subscribe to a typed channel per orchestrator instead of a
//! global bus. `subscribe`/`unsubscribe` are symmetric and unsubscribing
//! twice is harmless.

use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::sort::{SortSettingsPayload, SortUpdate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum PivotEvent {
    QueryStart,
    QueryEnd,
    LoadingStart,
    LoadingEnd,
    SortUpdate(SortUpdate),
    SortingSettingsChanged(SortSettingsPayload),
    PageChange(usize),
    EmptyChange(bool),
    /// Total table height in pixels.
    TotalHeightChange(f64),
    DomReady,
    FirstPageRendered,
    TotalWidgetRendered,
}

pub type SubscriberId = u64;

#[derive(Debug, Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: SubscriberId,
    subscribers: FxHashMap<SubscriberId, UnboundedSender<PivotEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (SubscriberId, UnboundedReceiver<PivotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.insert(id, tx);
        (id, rx)
    }

    /// Returns false when the subscriber was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.len()
    }

    /// Sends to every subscriber. Subscribers whose receiver was dropped are
    /// removed.
    pub fn emit(&self, event: PivotEvent) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_every_subscriber() {
        let bus = EventBus::new();
        let (_, mut a) = bus.subscribe();
        let (_, mut b) = bus.subscribe();
        bus.emit(PivotEvent::QueryStart);
        assert_eq!(a.try_recv().unwrap(), PivotEvent::QueryStart);
        assert_eq!(b.try_recv().unwrap(), PivotEvent::QueryStart);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let (id, mut rx) = bus.subscribe();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(PivotEvent::DomReady);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let bus = EventBus::new();
        let (_, rx) = bus.subscribe();
        drop(rx);
        bus.emit(PivotEvent::LoadingStart);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(PivotEvent::EmptyChange(true)).unwrap();
        assert_eq!(json["type"], "emptyChange");
        assert_eq!(json["payload"], true);
    }
}
