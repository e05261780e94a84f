//! Element Handle - a fixed, ordered set of elements plus the binding API

use dom::NodeId;

use crate::binding::{self, Bindings, Rendered};
use crate::error::Result;
use crate::router::{self, Listeners, RoutedEvent};
use crate::session::Session;
use crate::source::PushSource;

/// Ordered, deduplicated elements captured at query time.
/// Later tree changes are not reflected.
#[derive(Clone)]
pub struct ElementHandle {
    session: Session,
    elements: Vec<NodeId>,
}

impl ElementHandle {
    pub fn new<I>(session: Session, elements: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut unique = Vec::new();
        for element in elements {
            if !unique.contains(&element) {
                unique.push(element);
            }
        }
        Self {
            session,
            elements: unique,
        }
    }

    pub fn first(&self) -> Option<NodeId> {
        self.elements.first().copied()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.elements.iter().copied()
    }

    pub fn elements(&self) -> &[NodeId] {
        &self.elements
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Keep every element in sync with `source`.
    ///
    /// Sequence emissions are diffed against the previous sequence and
    /// applied to the element's children; scalar emissions replace the
    /// element's content. `render` receives the item, the bound element and
    /// the slot index (`None` for scalars).
    pub fn bind<T, S, F>(&self, source: &S, render: F) -> Result<Bindings>
    where
        T: PartialEq + Clone + 'static,
        S: PushSource<T> + ?Sized,
        F: Fn(&T, NodeId, Option<usize>) -> Result<Rendered> + 'static,
    {
        binding::bind(&self.session, &self.elements, source, render)
    }

    /// Direct listener on every element
    pub fn on<F>(&self, event_type: &str, handler: F) -> Result<Listeners>
    where
        F: Fn(&RoutedEvent<'_>) + 'static,
    {
        router::on(&self.session, &self.elements, event_type, handler)
    }

    /// Delegated listener: `handler` runs once per descendant matching
    /// `selector` that contains the event's target
    pub fn delegate<F>(&self, event_type: &str, selector: &str, handler: F) -> Result<Listeners>
    where
        F: Fn(&RoutedEvent<'_>) + 'static,
    {
        router::delegate(&self.session, &self.elements, event_type, selector, handler)
    }
}

impl std::fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHandle")
            .field("session", &self.session.id())
            .field("elements", &self.elements)
            .finish()
    }
}
