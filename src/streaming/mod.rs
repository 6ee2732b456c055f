//! Streaming pipeline
//!
//! The session-side half of the crate: the delta parser that validates and
//! diffs raw provider increments, the coordinator that folds everything
//! into one ordered persisted stream, and the service surface that tracks
//! live sessions and hands out resumable subscriptions.

pub mod coordinator;
pub mod parser;
pub mod service;
pub(crate) mod suggestions;

pub use coordinator::{SessionHandle, StreamConfig, StreamCoordinator, Subscription};
pub use parser::{parse_tool_call, StructuredDeltaParser, ToolInvocation};
pub use service::StreamService;
