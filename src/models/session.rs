//! Session Model
//!
//! One session is one end-to-end generation run. Sessions are owned by the
//! stream coordinator while active; once terminal the record is immutable
//! and belongs to the resumable stream store for replay.

use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;
use crate::utils::time::now_rfc3339;

/// Completion state of a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Still streaming
    Active,
    /// Ended on natural stream end
    Completed,
    /// Ended on provider error, cancellation, or timeout
    Aborted,
}

impl SessionState {
    /// Whether this state is terminal (immutable once reached).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Active)
    }

    /// Stable string tag used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Completed => "completed",
            SessionState::Aborted => "aborted",
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionState::Active),
            "completed" => Ok(SessionState::Completed),
            "aborted" => Ok(SessionState::Aborted),
            other => Err(AppError::internal(format!(
                "unknown session state: {}",
                other
            ))),
        }
    }
}

/// One generation run, from request to finish/abort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id
    pub id: String,
    /// Chat this session belongs to
    pub chat_id: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// Completion state
    pub state: SessionState,
}

impl Session {
    /// Create a new active session with a fresh id.
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            created_at: now_rfc3339(),
            state: SessionState::Active,
        }
    }
}
