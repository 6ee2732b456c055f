//! Artifact Document Model
//!
//! A structured side-product of a session. Documents version-stack: every
//! save of an existing id inserts a new `(id, version)` row, prior versions
//! are kept as history.

use serde::{Deserialize, Serialize};

use loomchat_core::ArtifactKind;

use crate::utils::time::now_rfc3339;

/// One version of an artifact document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDocument {
    /// Document id (stable across versions)
    pub id: String,
    /// Owning chat id
    pub chat_id: String,
    /// Document kind
    pub kind: ArtifactKind,
    /// Human-readable title
    pub title: String,
    /// Full accumulated body (kind-specific representation)
    pub content: String,
    /// Version number, starting at 1
    pub version: u32,
    /// RFC 3339 creation timestamp of this version
    pub created_at: String,
}

impl ArtifactDocument {
    /// First version of a freshly created document.
    pub fn first_version(
        id: impl Into<String>,
        chat_id: impl Into<String>,
        kind: ArtifactKind,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            kind,
            title: title.into(),
            content: content.into(),
            version: 1,
            created_at: now_rfc3339(),
        }
    }

    /// Next version of this document with replaced content.
    pub fn next_version(&self, content: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            chat_id: self.chat_id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            content: content.into(),
            version: self.version + 1,
            created_at: now_rfc3339(),
        }
    }
}
