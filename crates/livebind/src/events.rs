//! Event Bus - lifecycle notifications for bindings, listeners and components
//!
//! Plain enum over a tokio broadcast channel. Publishing never fails and
//! never blocks; slow receivers see `Lagged`.

use dom::NodeId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle events published by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Bound { element: NodeId, parent: Option<NodeId> },
    Unbound { element: NodeId },
    ListenerAttached { element: NodeId, event_type: String },
    ListenerRemoved { element: NodeId, event_type: String },
    ComponentDefined { name: String },
    ComponentUpgraded { name: String, host: NodeId },
}

pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
