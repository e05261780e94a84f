//! Binding Session
//!
//! Owns everything the binding layer shares per document: configuration,
//! the liveness monitor, the key side-table, the component registry and the
//! lifecycle event bus. Cheap to clone.

use dom::{Document, NodeId, ObserverId};
use serde::{Deserialize, Serialize};
use std::rc::{Rc, Weak};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::component::{ComponentOptions, ComponentRegistry};
use crate::error::Result;
use crate::events::{EventBus, LifecycleEvent};
use crate::handle::ElementHandle;
use crate::keys::KeyTable;
use crate::liveness::LivenessMonitor;

/// Where `Create` entries put new children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatePlacement {
    /// Always the last child
    #[default]
    Append,
    /// Before the element child currently at the entry's index
    Indexed,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub id: String,
    pub key_attribute: String,
    pub stamp_key_attribute: bool,
    pub create_placement: CreatePlacement,
    pub event_bus_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            key_attribute: "data-key".to_string(),
            stamp_key_attribute: true,
            create_placement: CreatePlacement::Append,
            event_bus_capacity: 1024,
        }
    }
}

pub(crate) struct SessionInner {
    pub(crate) config: SessionConfig,
    pub(crate) document: Document,
    pub(crate) monitor: Rc<LivenessMonitor>,
    pub(crate) keys: KeyTable,
    pub(crate) components: ComponentRegistry,
    pub(crate) event_bus: EventBus,
    observer: ObserverId,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.document.disconnect(self.observer);
    }
}

/// Binding session over one document
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Rc<SessionInner>,
}

/// Non-owning session handle, for closures stored inside the document
#[derive(Clone)]
pub(crate) struct WeakSession {
    inner: Weak<SessionInner>,
}

impl WeakSession {
    pub(crate) fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }
}

impl Session {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, SessionConfig::default())
    }

    pub fn with_config(document: Document, config: SessionConfig) -> Self {
        let monitor = Rc::new(LivenessMonitor::new());
        let observer = monitor.attach(&document);
        let event_bus = EventBus::with_capacity(config.event_bus_capacity);
        tracing::debug!(session = %config.id, "Session created");

        Self {
            inner: Rc::new(SessionInner {
                config,
                document,
                monitor,
                keys: KeyTable::new(),
                components: ComponentRegistry::default(),
                event_bus,
                observer,
            }),
        }
    }

    /// Parse `html` into a fresh document and open a session on it
    pub fn parse(html: &str) -> Result<Self> {
        Ok(Self::new(Document::parse(html)?))
    }

    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn monitor(&self) -> &LivenessMonitor {
        &self.inner.monitor
    }

    /// Elements matching `selector` anywhere in the light tree, in document order
    pub fn query(&self, selector: &str) -> Result<ElementHandle> {
        self.query_in(self.inner.document.root(), selector)
    }

    /// Descendants of `scope` matching `selector`
    pub fn query_in(&self, scope: NodeId, selector: &str) -> Result<ElementHandle> {
        let elements = self.inner.document.query_selector_all(scope, selector)?;
        Ok(self.handle(elements))
    }

    /// Wrap already known elements
    pub fn handle<I>(&self, elements: I) -> ElementHandle
    where
        I: IntoIterator<Item = NodeId>,
    {
        ElementHandle::new(self.clone(), elements)
    }

    /// Deliver pending mutation batches; watched parents that were removed
    /// get torn down here.
    pub fn flush(&self) -> usize {
        self.inner.document.flush_mutations()
    }

    /// Rendering key of an engine-generated child
    pub fn key_of(&self, node: NodeId) -> Option<usize> {
        self.inner.keys.get(node)
    }

    /// Register a component from `<template id="name-with-hyphen">` markup
    /// and upgrade matching elements already in the document.
    pub fn define(&self, template: &str, options: ComponentOptions) -> Result<String> {
        self.inner.components.define(self, template, options)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.inner.components.is_defined(name)
    }

    /// Create a detached, upgraded instance of a defined component
    pub fn create_component(&self, name: &str) -> Result<NodeId> {
        self.inner.components.create(self, name)
    }

    /// Upgrade defined components at or below `root`; returns how many
    pub fn upgrade(&self, root: NodeId) -> Result<usize> {
        self.inner.components.upgrade(self, root)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.event_bus.subscribe()
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        self.inner.event_bus.publish(event);
    }

    pub(crate) fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.config.id)
            .field("watched", &self.inner.monitor.watched_count())
            .field("keys", &self.inner.keys.len())
            .finish()
    }
}
