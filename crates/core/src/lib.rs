//! Loomchat Core
//!
//! Shared event types and the error taxonomy for the Loomchat streaming
//! pipeline. This crate is deliberately dependency-light (serde + thiserror
//! only) so that transport adapters and the main application crate can both
//! depend on it without pulling in the async runtime or storage stack.

pub mod error;
pub mod events;

pub use error::{CoreError, CoreResult};
pub use events::{
    ArtifactKind, SequencedEvent, StreamEvent, Suggestion, TransportEvent,
};
