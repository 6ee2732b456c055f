//! Loomchat streaming core
//!
//! A resumable, multi-consumer, schema-validated streaming pipeline for a
//! chat assistant that synthesizes structured artifact documents alongside
//! its conversational output. The pieces:
//!
//! - [`schema`] — the validation adapter bridging new-form declarative
//!   schemas and the legacy object shape older tool consumers require
//! - [`artifacts`] — the kind registry and per-kind generation handlers
//! - [`streaming`] — the delta parser, the stream coordinator, and the
//!   session-facing service with resumable subscriptions
//! - [`storage`] — the SQLite-backed resumable stream store and
//!   version-stacked document persistence
//! - [`provider`] — the generation backend seam (plus a scripted test
//!   double)

pub mod artifacts;
pub mod models;
pub mod provider;
pub mod schema;
pub mod storage;
pub mod streaming;
pub mod utils;

pub use loomchat_core::{
    ArtifactKind, SequencedEvent, StreamEvent, Suggestion, TransportEvent,
};
