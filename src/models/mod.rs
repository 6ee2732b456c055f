//! Data models

pub mod document;
pub mod session;

pub use document::ArtifactDocument;
pub use session::{Session, SessionState};
