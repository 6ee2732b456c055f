//! Error Handling
//!
//! Unified error types for the application crate.
//! Extends the core taxonomy with storage variants that require heavier
//! dependencies (rusqlite, std::io).

use loomchat_core::CoreError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors (pool exhaustion, schema setup, ...)
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A delta or tool input failed schema validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upstream generation call failed or timed out
    #[error("Provider error: {0}")]
    Provider(String),

    /// The resumable stream store rejected an operation.
    ///
    /// A sequence-contiguity violation is fatal to the coordinator that
    /// produced it (duplicate coordinator or corruption) but not to the
    /// process.
    #[error("Store error: {0}")]
    Store(String),

    /// An artifact kind handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration errors (e.g., no handler registered for a kind)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

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

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(m) => AppError::Validation(m),
            CoreError::Provider(m) => AppError::Provider(m),
            CoreError::Store(m) => AppError::Store(m),
            CoreError::Handler(m) => AppError::Handler(m),
            CoreError::Config(m) => AppError::Config(m),
            CoreError::NotFound(m) => AppError::NotFound(m),
            CoreError::Serialization(e) => AppError::Serialization(e),
            CoreError::Internal(m) => AppError::Internal(m),
        }
    }
}

/// Convert AppError to a string suitable for transport-facing responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
