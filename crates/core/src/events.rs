//! Stream Event Types
//!
//! Provider-agnostic events that flow from the stream coordinator to every
//! attached subscriber. These types are shared across the application crate
//! (coordinator, store, artifact handlers) and any transport adapter the
//! web layer plugs in, so the wire format lives here.
//!
//! Two envelopes exist around [`StreamEvent`]:
//!
//! - [`SequencedEvent`] — a persisted event with its store sequence number.
//!   Sequence numbers are contiguous from 1 within a session.
//! - [`TransportEvent`] — what a live subscriber receives. Transient events
//!   (UI sugar that is never stored) ride along with `seq: None`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The closed set of structured-document kinds a session can synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Source code document
    Code,
    /// Prose/markdown document
    Text,
    /// Raster image document (base64 payload)
    Image,
    /// Tabular document (delimited rows)
    Sheet,
}

impl ArtifactKind {
    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Code => "code",
            ArtifactKind::Text => "text",
            ArtifactKind::Image => "image",
            ArtifactKind::Sheet => "sheet",
        }
    }

    /// All kinds, in registration order.
    pub fn all() -> [ArtifactKind; 4] {
        [
            ArtifactKind::Code,
            ArtifactKind::Text,
            ArtifactKind::Image,
            ArtifactKind::Sheet,
        ]
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ArtifactKind::Code),
            "text" => Ok(ArtifactKind::Text),
            "image" => Ok(ArtifactKind::Image),
            "sheet" => Ok(ArtifactKind::Sheet),
            other => Err(CoreError::validation(format!(
                "unknown artifact kind: {}",
                other
            ))),
        }
    }
}

/// A writing suggestion produced against an existing document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Unique suggestion id
    pub id: String,
    /// Document this suggestion targets
    pub document_id: String,
    /// The text being commented on
    pub original_text: String,
    /// The proposed replacement
    pub suggested_text: String,
    /// Optional rationale shown to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Unified streaming event delivered to subscribers and (when persisted)
/// appended to the resumable stream store.
///
/// The serialized form is internally tagged so the web layer can dispatch on
/// `type` without knowing the Rust enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Assistant text delta for the transcript view
    TextDelta { content: String },

    /// Announces the id of the artifact document being synthesized
    ArtifactId { document_id: String },

    /// Announces the artifact title (arrives before any content)
    ArtifactTitle { title: String },

    /// Announces the artifact kind so the client can mount the right pane
    ArtifactKindTag { kind: ArtifactKind },

    /// Validated artifact content chunk.
    ///
    /// Persisted so a reconnecting subscriber can rebuild the artifact pane
    /// from replay alone.
    ArtifactDelta { kind: ArtifactKind, content: String },

    /// Reset the artifact pane before an update rewrites it.
    ///
    /// Pure UI sugar; never stored and exempt from sequencing.
    Clear,

    /// A writing suggestion against an existing document
    Suggestion { suggestion: Suggestion },

    /// Stream completed normally
    Finish {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },

    /// Visible but non-destructive error marker.
    ///
    /// Carries a user-presentable message only, never internal diagnostics.
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event is fire-and-forget UI sugar.
    ///
    /// Transient events are broadcast to live subscribers but never appended
    /// to the resumable stream store, so they carry no sequence number and
    /// are exempt from the gap-free guarantee.
    pub fn is_transient(&self) -> bool {
        matches!(self, StreamEvent::Clear)
    }

    /// Whether this event terminates the stream.
    ///
    /// Every session stream ends with exactly one finish event; aborted
    /// sessions emit an error marker first, but errors on their own do not
    /// end the stream (a rejected tool call leaves the session running).
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Finish { .. })
    }

    /// Stable name of the event kind (matches the serialized `type` tag).
    pub fn kind_name(&self) -> &'static str {
        match self {
            StreamEvent::TextDelta { .. } => "text_delta",
            StreamEvent::ArtifactId { .. } => "artifact_id",
            StreamEvent::ArtifactTitle { .. } => "artifact_title",
            StreamEvent::ArtifactKindTag { .. } => "artifact_kind_tag",
            StreamEvent::ArtifactDelta { .. } => "artifact_delta",
            StreamEvent::Clear => "clear",
            StreamEvent::Suggestion { .. } => "suggestion",
            StreamEvent::Finish { .. } => "finish",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// A persisted event together with its session-scoped sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// Monotonic, gap-free sequence number (starts at 1)
    pub seq: u64,
    /// The event payload
    pub event: StreamEvent,
}

impl SequencedEvent {
    pub fn new(seq: u64, event: StreamEvent) -> Self {
        Self { seq, event }
    }
}

/// The unit a live subscriber receives.
///
/// Stored events carry their sequence number so the client can resume with
/// `subscribe(session_id, last_seen_seq)` after a disconnect; transient
/// events carry `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub event: StreamEvent,
}

impl TransportEvent {
    /// Wrap a persisted event for transport.
    pub fn stored(sequenced: SequencedEvent) -> Self {
        Self {
            seq: Some(sequenced.seq),
            event: sequenced.event,
        }
    }

    /// Wrap a transient event for transport.
    pub fn transient(event: StreamEvent) -> Self {
        Self { seq: None, event }
    }
}
