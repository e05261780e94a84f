//! Reactive DOM binding
//!
//! Keeps elements in sync with push sources and routes delegated events,
//! tearing both down when the element's parent leaves the document.
//!
//! ## Core Design
//!
//! ```text
//! PushSource ──emission──▶ Binding Engine ──diff──▶ Document (dom crate)
//!                                                     │ mutation batches
//! Router ◀──native events── Document                  ▼
//!    └──────── teardown ◀──────────────────── Liveness Monitor
//! ```
//!
//! Everything is single-threaded (`Rc`/`RefCell`). Mutation batches reach
//! the liveness monitor when the host calls [`Session::flush`].

pub mod binding;
pub mod component;
pub mod diff;
pub mod error;
pub mod events;
pub mod handle;
pub mod keys;
pub mod liveness;
pub mod router;
pub mod session;
pub mod source;

pub use binding::{Binding, Bindings, Rendered};
pub use component::{ComponentOptions, ScopedQuery, SetupFn};
pub use diff::{apply, diff, DiffEntry};
pub use error::{BindError, Result};
pub use events::{EventBus, LifecycleEvent};
pub use handle::ElementHandle;
pub use keys::KeyTable;
pub use liveness::{LivenessMonitor, Teardown, WatchId};
pub use router::{Listener, Listeners, RoutedEvent};
pub use session::{CreatePlacement, Session, SessionConfig};
pub use source::{
    forward_broadcast, forward_stream, Emission, Observer, PushSource, Subject, Subscription,
};

pub use dom;
