//! Core Error Types
//!
//! Defines the foundational error taxonomy used across the Loomchat
//! workspace. These error types are dependency-free (only thiserror + serde)
//! to keep the core crate lightweight.
//!
//! The main application crate extends these with additional variants
//! (e.g., Database, Sqlite) that require heavier dependencies.

use thiserror::Error;

/// Core error type for the Loomchat workspace.
///
/// This is the minimal error set the streaming pipeline needs. The
/// application crate defines additional variants for storage etc.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A delta or tool input failed schema validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upstream generation call failed or timed out
    #[error("Provider error: {0}")]
    Provider(String),

    /// The resumable stream store rejected an operation
    /// (e.g., a sequence-contiguity violation)
    #[error("Store error: {0}")]
    Store(String),

    /// An artifact kind handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration errors (e.g., missing handler for a registered kind)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a handler error
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
