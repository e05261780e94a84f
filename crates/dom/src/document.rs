//! Document - shared handle over the arena
//!
//! This is the entry point callers and the binding layer use. It owns:
//! - the node arena
//! - event listeners and bubbling dispatch
//! - mutation observers, fed in batches by `flush_mutations`
//!
//! The handle is cheap to clone (`Rc`). No borrow of the internal state is
//! held while listener or observer callbacks run, so callbacks may freely
//! read and mutate the document.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::arena::DomArena;
use crate::error::Result;
use crate::event::{Event, EventCallback, ListenerId, ListenerTable};
use crate::mutation::{MutationRecord, ObserverId};
use crate::parser;
use crate::selector::Selector;
use crate::serializer::DomSerializer;
use crate::types::NodeId;
use crate::utils;

/// Mutation observer callback, invoked once per delivered batch
pub type MutationCallback = Rc<dyn Fn(&[MutationRecord])>;

/// Upper bound on observer rounds per flush (observers may mutate again)
const MAX_FLUSH_ROUNDS: usize = 64;

struct DocumentState {
    arena: DomArena,
    listeners: ListenerTable,
    observers: Vec<(ObserverId, MutationCallback)>,
    next_id: u64,
}

impl DocumentState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentState>>,
}

/// Non-owning document handle, for closures stored inside the document
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<RefCell<DocumentState>>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Document {
    /// Empty document (only the document node)
    pub fn new() -> Self {
        Self::from_arena(DomArena::new())
    }

    pub fn from_arena(arena: DomArena) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DocumentState {
                arena,
                listeners: ListenerTable::default(),
                observers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Parse a full HTML document
    pub fn parse(html: &str) -> Result<Self> {
        Ok(Self::from_arena(parser::parse_document(html)?))
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with shared access to the arena
    pub fn read<R>(&self, f: impl FnOnce(&DomArena) -> R) -> R {
        f(&self.inner.borrow().arena)
    }

    /// Run `f` with exclusive access to the arena
    pub fn write<R>(&self, f: impl FnOnce(&mut DomArena) -> R) -> R {
        f(&mut self.inner.borrow_mut().arena)
    }

    pub fn root(&self) -> NodeId {
        self.read(|arena| arena.root_id())
    }

    /// First `<body>` element, if the document has one
    pub fn body(&self) -> Option<NodeId> {
        self.read(|arena| arena.find_by_tag("body").into_iter().next())
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.read(|arena| arena.find_by_id(id))
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.write(|arena| arena.create_element(tag))
    }

    pub fn create_text(&self, value: &str) -> NodeId {
        self.write(|arena| arena.create_text(value))
    }

    /// Parse markup describing exactly one element; see `parser::parse_element`
    pub fn parse_element(&self, markup: &str) -> Result<NodeId> {
        self.write(|arena| parser::parse_element(arena, markup))
    }

    /// Parse markup into a detached fragment
    pub fn parse_fragment(&self, markup: &str) -> Result<NodeId> {
        self.write(|arena| parser::parse_fragment(arena, markup))
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.write(|arena| arena.append_child(parent, child))
    }

    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<()> {
        self.write(|arena| arena.insert_before(parent, child, reference))
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.write(|arena| arena.remove_child(parent, child))
    }

    pub fn replace_child(&self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()> {
        self.write(|arena| arena.replace_child(parent, new_child, old_child))
    }

    /// Detach a node from its parent, like `Element.remove()`
    pub fn remove(&self, node: NodeId) -> Result<bool> {
        self.write(|arena| arena.detach(node))
    }

    pub fn clear_children(&self, node: NodeId) -> Result<()> {
        self.write(|arena| arena.clear_children(node))
    }

    pub fn clone_node(&self, node: NodeId, deep: bool) -> Result<NodeId> {
        self.write(|arena| arena.clone_node(node, deep))
    }

    pub fn attach_shadow(&self, host: NodeId) -> Result<NodeId> {
        self.write(|arena| arena.attach_shadow(host))
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.read(|arena| arena.get(host).ok().and_then(|node| node.shadow_root_id))
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.write(|arena| arena.set_attribute(node, name, value))
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        self.write(|arena| arena.remove_attribute(node, name))
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        self.read(|arena| Ok(arena.get(node)?.attr(name).map(str::to_string)))
    }

    pub fn tag_name(&self, node: NodeId) -> Result<Option<String>> {
        self.read(|arena| Ok(arena.get(node)?.tag_name().map(str::to_string)))
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.read(|arena| Ok(arena.children(node)?.to_vec()))
    }

    pub fn element_children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.read(|arena| arena.element_children(node))
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.read(|arena| arena.parent(node))
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.read(|arena| arena.contains(ancestor, node))
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.read(|arena| arena.is_connected(node))
    }

    /// Replace all children of `node` with the parsed markup (not escaped)
    ///
    /// The markup is parsed in the context of `node` itself, or of the host
    /// for a shadow root.
    pub fn set_inner_html(&self, node: NodeId, markup: &str) -> Result<()> {
        self.write(|arena| {
            let context = fragment_context(arena, node)?;
            arena.clear_children(node)?;
            let fragment = parser::parse_fragment_in(arena, markup, &context)?;
            arena.append_child(node, fragment)
        })
    }

    pub fn inner_html(&self, node: NodeId) -> Result<String> {
        self.read(|arena| DomSerializer::new().inner_html(arena, node))
    }

    pub fn outer_html(&self, node: NodeId) -> Result<String> {
        self.read(|arena| DomSerializer::new().outer_html(arena, node))
    }

    pub fn text_content(&self, node: NodeId) -> Result<String> {
        self.read(|arena| utils::get_text_content(arena, node))
    }

    /// Elements under `scope` matching `selector`, in document order
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        self.select(scope, &selector)
    }

    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(scope, selector)?.into_iter().next())
    }

    /// Query with an already compiled selector
    pub fn select(&self, scope: NodeId, selector: &Selector) -> Result<Vec<NodeId>> {
        self.read(|arena| selector.query_all(arena, scope))
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.read(|arena| selector.matches(arena, node))
    }

    /// Register a listener for `event_type` on `node`
    pub fn add_event_listener<F>(&self, node: NodeId, event_type: &str, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        let mut state = self.inner.borrow_mut();
        state.arena.get(node)?;
        let id = ListenerId(state.next_id());
        let callback: EventCallback = Rc::new(callback);
        state.listeners.insert(id, node, event_type, callback);
        Ok(id)
    }

    /// Returns false when the listener was already removed
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(id).is_some()
    }

    pub fn listener_count(&self, node: NodeId, event_type: &str) -> usize {
        self.inner.borrow().listeners.count(node, event_type)
    }

    pub fn total_listeners(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Fire a bubbling event of `event_type` at `target`
    pub fn dispatch(&self, target: NodeId, event_type: &str) -> Result<Event> {
        let event = Event::new(event_type, target);
        self.dispatch_event(&event)?;
        Ok(event)
    }

    /// Run listeners along the event path (target first, then ancestors,
    /// crossing shadow roots into their hosts). The path is fixed before any
    /// listener runs; a listener removed mid-dispatch is not called.
    pub fn dispatch_event(&self, event: &Event) -> Result<()> {
        let path = self.read(|arena| -> Result<Vec<NodeId>> {
            arena.get(event.target)?;
            let mut path = vec![event.target];
            if event.bubbles {
                let mut current = arena.parent_or_host(event.target);
                while let Some(node) = current {
                    path.push(node);
                    current = arena.parent_or_host(node);
                }
            }
            Ok(path)
        })?;

        for node in path {
            event.set_current_target(node);
            let listeners = self.inner.borrow().listeners.snapshot(node, &event.event_type);
            for (id, callback) in listeners {
                if !self.inner.borrow().listeners.contains(id) {
                    continue;
                }
                callback(event);
            }
            if event.is_propagation_stopped() {
                break;
            }
        }
        Ok(())
    }

    /// Register a mutation observer for the whole light tree
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&[MutationRecord]) + 'static,
    {
        let mut state = self.inner.borrow_mut();
        let id = ObserverId(state.next_id());
        let callback: MutationCallback = Rc::new(callback);
        state.observers.push((id, callback));
        id
    }

    pub fn disconnect(&self, id: ObserverId) -> bool {
        let mut state = self.inner.borrow_mut();
        let before = state.observers.len();
        state.observers.retain(|(observer, _)| *observer != id);
        state.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    pub fn has_pending_mutations(&self) -> bool {
        self.read(|arena| arena.has_pending_records())
    }

    /// Deliver pending mutation records to every observer.
    ///
    /// Records produced by observers are delivered in a further round.
    /// Returns the number of records delivered.
    pub fn flush_mutations(&self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            let records = self.write(|arena| arena.take_records());
            if records.is_empty() {
                return delivered;
            }
            let observers: Vec<MutationCallback> = self
                .inner
                .borrow()
                .observers
                .iter()
                .map(|(_, callback)| Rc::clone(callback))
                .collect();

            tracing::trace!(
                records = records.len(),
                observers = observers.len(),
                "Delivering mutation batch"
            );
            for observer in observers {
                observer(&records);
            }
            delivered += records.len();
        }

        tracing::warn!(
            rounds = MAX_FLUSH_ROUNDS,
            "Mutation observers kept mutating the document; leaving records pending"
        );
        delivered
    }
}

/// Tag whose `innerHTML` rules apply when parsing into `node`
fn fragment_context(arena: &DomArena, node: NodeId) -> Result<String> {
    let target = arena.get(node)?;
    let element = match target.host_id {
        Some(host) => arena.get(host)?,
        None => target,
    };
    Ok(element.tag_name().unwrap_or("body").to_string())
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &state.arena.len())
            .field("listeners", &state.listeners.len())
            .field("observers", &state.observers.len())
            .finish()
    }
}
