//! Liveness Monitor - teardown when a watched parent leaves the document
//!
//! One registry per session, keyed by the parent's node identity. The monitor
//! listens to the document's mutation batches; every watch whose parent shows
//! up among a batch's removed nodes fires once and is forgotten.
//!
//! Only the parent itself counts. Moving the bound element somewhere else, or
//! removing a grand-parent, does not fire anything.

use ahash::AHashMap;
use dom::{Document, MutationRecord, NodeId, ObserverId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Teardown action run when the watched parent is removed
pub type Teardown = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

#[derive(Default)]
pub struct LivenessMonitor {
    watches: RefCell<AHashMap<NodeId, Vec<(WatchId, Teardown)>>>,
    next_id: Cell<u64>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed this monitor from `document`'s mutation batches.
    ///
    /// The observer holds a weak handle, so dropping the monitor silently
    /// stops it.
    pub fn attach(self: &Rc<Self>, document: &Document) -> ObserverId {
        let monitor = Rc::downgrade(self);
        document.observe(move |records| {
            if let Some(monitor) = monitor.upgrade() {
                monitor.on_mutations(records);
            }
        })
    }

    /// Run `teardown` once when `parent` is removed from its own parent
    pub fn watch<F>(&self, parent: NodeId, teardown: F) -> WatchId
    where
        F: FnOnce() + 'static,
    {
        let id = WatchId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.watches
            .borrow_mut()
            .entry(parent)
            .or_default()
            .push((id, Box::new(teardown)));
        tracing::trace!(parent, watch = id.0, "Watching parent");
        id
    }

    /// Forget a watch without running it
    pub fn unwatch(&self, id: WatchId) -> bool {
        let mut watches = self.watches.borrow_mut();
        let Some(parent) = watches
            .iter()
            .find(|(_, list)| list.iter().any(|(watch, _)| *watch == id))
            .map(|(parent, _)| *parent)
        else {
            return false;
        };

        if let Some(list) = watches.get_mut(&parent) {
            list.retain(|(watch, _)| *watch != id);
            if list.is_empty() {
                watches.remove(&parent);
            }
        }
        true
    }

    /// Forget every watch on `parent`; returns how many were dropped
    pub fn unwatch_node(&self, parent: NodeId) -> usize {
        self.watches
            .borrow_mut()
            .remove(&parent)
            .map_or(0, |list| list.len())
    }

    pub fn is_watched(&self, parent: NodeId) -> bool {
        self.watches.borrow().contains_key(&parent)
    }

    /// Total number of pending watches
    pub fn watched_count(&self) -> usize {
        self.watches.borrow().values().map(Vec::len).sum()
    }

    /// Fire watches whose parent was removed in this batch.
    /// Returns the number of teardowns run.
    pub fn on_mutations(&self, records: &[MutationRecord]) -> usize {
        let fired: Vec<(NodeId, Teardown)> = {
            let mut watches = self.watches.borrow_mut();
            if watches.is_empty() {
                return 0;
            }
            let mut fired = Vec::new();
            for record in records {
                for removed in &record.removed_nodes {
                    if let Some(list) = watches.remove(removed) {
                        fired.extend(list.into_iter().map(|(_, teardown)| (*removed, teardown)));
                    }
                }
            }
            fired
        };

        let count = fired.len();
        for (parent, teardown) in fired {
            tracing::debug!(parent, "Watched parent removed; tearing down");
            teardown();
        }
        count
    }
}

impl std::fmt::Debug for LivenessMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessMonitor")
            .field("watched", &self.watched_count())
            .finish()
    }
}
