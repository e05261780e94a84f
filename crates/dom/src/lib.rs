//! In-process DOM
//!
//! Arena-backed element tree with the pieces a binding layer needs from a
//! browser: HTML parsing, serialization, selector queries, bubbling events
//! and batched child-list mutation records.
//!
//! ## Core Design
//!
//! ```text
//! markup → html5ever RcDom → DomArena (owned) → Selector / Serializer
//!                                 ↓
//!                           NodeId (u32), stable for the arena's lifetime
//! ```

pub mod arena;
pub mod document;
pub mod error;
pub mod event;
pub mod mutation;
pub mod parser;
pub mod selector;
pub mod serializer;
pub mod types;
pub mod utils;

pub use arena::DomArena;
pub use document::{Document, MutationCallback, WeakDocument};
pub use error::{DomError, Result};
pub use event::{Event, EventCallback, ListenerId};
pub use mutation::{MutationRecord, ObserverId};
pub use selector::Selector;
pub use serializer::{DomSerializer, SerializerConfig};
pub use types::*;
