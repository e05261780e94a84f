//! Native events and listener storage

use ahash::AHashMap;
use std::cell::Cell;
use std::rc::Rc;

use crate::types::NodeId;

/// Listener callback
pub type EventCallback = Rc<dyn Fn(&Event)>;

/// Handle returned by `Document::add_event_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// An event travelling from `target` up through its ancestors
#[derive(Debug)]
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
    pub bubbles: bool,
    current_target: Cell<NodeId>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            bubbles: true,
            current_target: Cell::new(target),
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    /// An event that only reaches listeners on its target
    pub fn non_bubbling(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            bubbles: false,
            ..Self::new(event_type, target)
        }
    }

    /// Node whose listener is currently running
    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub(crate) fn set_current_target(&self, node: NodeId) {
        self.current_target.set(node);
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// Listeners keyed by (node, event type)
#[derive(Default)]
pub(crate) struct ListenerTable {
    by_target: AHashMap<(NodeId, String), Vec<(ListenerId, EventCallback)>>,
    by_id: AHashMap<ListenerId, (NodeId, String)>,
}

impl ListenerTable {
    pub(crate) fn insert(&mut self, id: ListenerId, node: NodeId, event_type: &str, callback: EventCallback) {
        self.by_target
            .entry((node, event_type.to_string()))
            .or_default()
            .push((id, callback));
        self.by_id.insert(id, (node, event_type.to_string()));
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> Option<(NodeId, String)> {
        let key = self.by_id.remove(&id)?;
        if let Some(list) = self.by_target.get_mut(&key) {
            list.retain(|(listener, _)| *listener != id);
            if list.is_empty() {
                self.by_target.remove(&key);
            }
        }
        Some(key)
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub(crate) fn snapshot(&self, node: NodeId, event_type: &str) -> Vec<(ListenerId, EventCallback)> {
        self.by_target
            .get(&(node, event_type.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, node: NodeId, event_type: &str) -> usize {
        self.by_target
            .get(&(node, event_type.to_string()))
            .map_or(0, Vec::len)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }
}
