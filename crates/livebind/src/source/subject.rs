//! In-process multicast source

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{Emission, Observer, PushSource, Subscription};
use crate::error::Result;

/// Multicast push source.
///
/// `Subject::new` only delivers emissions made after subscribing;
/// `Subject::with_value` also replays the latest emission on subscribe.
pub struct Subject<T> {
    inner: Rc<SubjectInner<T>>,
}

struct SubjectInner<T> {
    observers: RefCell<Vec<(u64, Observer<T>)>>,
    latest: RefCell<Option<Emission<T>>>,
    replay: bool,
    next_id: Cell<u64>,
}

impl<T: Clone + 'static> Subject<T> {
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// Replaying subject seeded with `initial`
    pub fn with_value(initial: Emission<T>) -> Self {
        Self::build(Some(initial), true)
    }

    fn build(latest: Option<Emission<T>>, replay: bool) -> Self {
        Self {
            inner: Rc::new(SubjectInner {
                observers: RefCell::new(Vec::new()),
                latest: RefCell::new(latest),
                replay,
                next_id: Cell::new(0),
            }),
        }
    }

    /// Deliver `emission` to every current observer, in subscription order.
    ///
    /// Every observer runs even if an earlier one fails; the first error is
    /// returned and the rest are logged.
    pub fn emit(&self, emission: Emission<T>) -> Result<()> {
        if self.inner.replay {
            *self.inner.latest.borrow_mut() = Some(emission.clone());
        }

        let observers = self.inner.observers.borrow().clone();
        let mut first_error = None;
        for (id, observer) in observers {
            // Cancelled by an earlier observer during this emission
            if !self.is_subscribed(id) {
                continue;
            }
            if let Err(err) = observer(&emission) {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    tracing::warn!(error = %err, "Observer failed after an earlier failure");
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn emit_sequence(&self, items: Vec<T>) -> Result<()> {
        self.emit(Emission::Sequence(items))
    }

    pub fn emit_scalar(&self, value: T) -> Result<()> {
        self.emit(Emission::Scalar(value))
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Latest emission, when replaying
    pub fn latest(&self) -> Option<Emission<T>> {
        self.inner.latest.borrow().clone()
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.inner
            .observers
            .borrow()
            .iter()
            .any(|(existing, _)| *existing == id)
    }
}

impl<T: Clone + 'static> PushSource<T> for Subject<T> {
    fn subscribe(&self, observer: Observer<T>) -> Result<Subscription> {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .observers
            .borrow_mut()
            .push((id, Rc::clone(&observer)));

        let weak: Weak<SubjectInner<T>> = Rc::downgrade(&self.inner);
        let subscription = Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.borrow_mut().retain(|(existing, _)| *existing != id);
            }
        });

        let replayed = if self.inner.replay {
            self.inner.latest.borrow().clone()
        } else {
            None
        };
        if let Some(emission) = replayed {
            if let Err(err) = observer(&emission) {
                subscription.cancel();
                return Err(err);
            }
        }

        Ok(subscription)
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}
