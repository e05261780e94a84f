//! Delegated Event Router
//!
//! One native listener per (element, event type). Delegated listeners
//! re-query the element's descendants on every firing, so children added
//! after registration are routed too.

use dom::{Event, ListenerId, NodeId, Selector};
use std::rc::Rc;

use crate::error::Result;
use crate::events::LifecycleEvent;
use crate::liveness::WatchId;
use crate::session::{Session, WeakSession};

/// Event passed to router handlers
#[derive(Debug, Clone, Copy)]
pub struct RoutedEvent<'a> {
    pub event: &'a Event,
    /// The bound element for `on`, the matching descendant for `delegate`
    pub main_target: NodeId,
    /// Rendering key of `main_target`, when it has one
    pub key: Option<usize>,
}

impl RoutedEvent<'_> {
    /// Node the event was originally fired at
    pub fn target(&self) -> NodeId {
        self.event.target
    }

    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }

    pub fn stop_propagation(&self) {
        self.event.stop_propagation();
    }

    pub fn prevent_default(&self) {
        self.event.prevent_default();
    }
}

/// One registered native listener
pub struct Listener {
    element: NodeId,
    event_type: String,
    id: ListenerId,
    watch: Option<WatchId>,
    session: WeakSession,
}

impl Listener {
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn has_teardown(&self) -> bool {
        self.watch.is_some()
    }

    /// Detach now. Returns false if already removed.
    pub fn remove(&self) -> bool {
        let Some(session) = self.session.upgrade() else {
            return false;
        };
        if let Some(watch) = self.watch {
            session.monitor().unwatch(watch);
        }
        detach(&session, self.element, &self.event_type, self.id)
    }
}

/// Listeners created by one `on`/`delegate` call, in handle order
pub struct Listeners(Vec<Listener>);

impl Listeners {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Listener> {
        self.0.iter()
    }

    pub fn remove_all(&self) -> usize {
        self.0.iter().filter(|listener| listener.remove()).count()
    }
}

impl std::ops::Index<usize> for Listeners {
    type Output = Listener;

    fn index(&self, index: usize) -> &Listener {
        &self.0[index]
    }
}

pub(crate) fn on<F>(session: &Session, elements: &[NodeId], event_type: &str, handler: F) -> Result<Listeners>
where
    F: Fn(&RoutedEvent<'_>) + 'static,
{
    let handler = Rc::new(handler);
    attach_all(session, elements, event_type, |element| {
        let weak = session.downgrade();
        let handler = Rc::clone(&handler);
        move |event: &Event| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            handler(&RoutedEvent {
                event,
                main_target: element,
                key: session.key_of(element),
            });
        }
    })
}

pub(crate) fn delegate<F>(
    session: &Session,
    elements: &[NodeId],
    event_type: &str,
    selector: &str,
    handler: F,
) -> Result<Listeners>
where
    F: Fn(&RoutedEvent<'_>) + 'static,
{
    let selector = Rc::new(Selector::parse(selector)?);
    let handler = Rc::new(handler);
    attach_all(session, elements, event_type, |element| {
        let weak = session.downgrade();
        let selector = Rc::clone(&selector);
        let handler = Rc::clone(&handler);
        move |event: &Event| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            let matched = match route(&session, element, &selector, event.target) {
                Ok(matched) => matched,
                Err(err) => {
                    tracing::warn!(element, error = %err, "Delegated query failed");
                    return;
                }
            };
            for main_target in matched {
                handler(&RoutedEvent {
                    event,
                    main_target,
                    key: session.key_of(main_target),
                });
            }
        }
    })
}

/// Descendants of `element` matching `selector` that contain `target`,
/// following shadow hosts so events from inside a component reach it
fn route(session: &Session, element: NodeId, selector: &Selector, target: NodeId) -> Result<Vec<NodeId>> {
    let document = session.document();
    let candidates = document.select(element, selector)?;
    Ok(document.read(|arena| {
        candidates
            .into_iter()
            .filter(|&candidate| {
                let mut current = Some(target);
                while let Some(node) = current {
                    if node == candidate {
                        return true;
                    }
                    current = arena.parent_or_host(node);
                }
                false
            })
            .collect()
    }))
}

fn attach_all<B, C>(session: &Session, elements: &[NodeId], event_type: &str, mut build: B) -> Result<Listeners>
where
    B: FnMut(NodeId) -> C,
    C: Fn(&Event) + 'static,
{
    let mut listeners = Vec::with_capacity(elements.len());
    for &element in elements {
        match attach(session, element, event_type, build(element)) {
            Ok(listener) => listeners.push(listener),
            Err(err) => {
                for listener in &listeners {
                    listener.remove();
                }
                return Err(err);
            }
        }
    }
    Ok(Listeners(listeners))
}

fn attach<C>(session: &Session, element: NodeId, event_type: &str, callback: C) -> Result<Listener>
where
    C: Fn(&Event) + 'static,
{
    let document = session.document();
    document.read(|arena| arena.element(element).map(|_| ()))?;
    let parent = document.parent(element)?;
    let id = document.add_event_listener(element, event_type, callback)?;

    let watch = parent.map(|parent| {
        let weak = session.downgrade();
        let event_type = event_type.to_string();
        session.monitor().watch(parent, move || {
            if let Some(session) = weak.upgrade() {
                detach(&session, element, &event_type, id);
            }
        })
    });

    tracing::debug!(session = %session.id(), element, event_type, "Listener attached");
    session.publish(LifecycleEvent::ListenerAttached {
        element,
        event_type: event_type.to_string(),
    });

    Ok(Listener {
        element,
        event_type: event_type.to_string(),
        id,
        watch,
        session: session.downgrade(),
    })
}

fn detach(session: &Session, element: NodeId, event_type: &str, id: ListenerId) -> bool {
    if !session.document().remove_event_listener(id) {
        return false;
    }
    tracing::debug!(session = %session.id(), element, event_type, "Listener removed");
    session.publish(LifecycleEvent::ListenerRemoved {
        element,
        event_type: event_type.to_string(),
    });
    true
}
