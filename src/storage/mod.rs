//! Storage layer
//!
//! Pooled SQLite access plus the two persistence seams the coordinator
//! depends on: the resumable stream store and document persistence. Both are
//! traits so tests and alternative backends can swap implementations.

pub mod database;
pub mod documents;
pub mod stream_store;

pub use database::Database;
pub use documents::{DocumentPersistence, SqliteDocumentStore};
pub use stream_store::{ResumableStreamStore, SqliteStreamStore, StoreConfig};
