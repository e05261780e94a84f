//! Push sources
//!
//! A push source hands emissions to observers and gives back a one-shot
//! cancel capability. Payloads are tagged up front: a `Sequence` drives the
//! differ, a `Scalar` replaces content.

pub mod forward;
pub mod subject;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;

pub use forward::{forward_broadcast, forward_stream};
pub use subject::Subject;

/// One value pushed by a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Emission<T> {
    Scalar(T),
    Sequence(Vec<T>),
}

impl<T> Emission<T> {
    pub fn is_sequence(&self) -> bool {
        matches!(self, Emission::Sequence(_))
    }

    pub fn as_sequence(&self) -> Option<&[T]> {
        match self {
            Emission::Sequence(items) => Some(items),
            Emission::Scalar(_) => None,
        }
    }
}

impl Emission<Value> {
    /// JSON arrays become sequences, everything else is a scalar
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => Emission::Sequence(items),
            other => Emission::Scalar(other),
        }
    }
}

impl<T> From<Vec<T>> for Emission<T> {
    fn from(items: Vec<T>) -> Self {
        Emission::Sequence(items)
    }
}

/// Observer callback. Errors propagate back to whoever emitted.
pub type Observer<T> = Rc<dyn Fn(&Emission<T>) -> Result<()>>;

/// Anything the binding engine can subscribe to
pub trait PushSource<T> {
    fn subscribe(&self, observer: Observer<T>) -> Result<Subscription>;
}

/// One-shot, idempotent cancellation. Clones share the same state.
#[derive(Clone)]
pub struct Subscription {
    cancel: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl Subscription {
    pub fn new<F: FnOnce() + 'static>(cancel: F) -> Self {
        Self {
            cancel: Rc::new(RefCell::new(Some(Box::new(cancel)))),
        }
    }

    /// Stop receiving emissions. Returns false if already cancelled.
    pub fn cancel(&self) -> bool {
        let cancel = self.cancel.borrow_mut().take();
        match cancel {
            Some(cancel) => {
                cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.borrow().is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
