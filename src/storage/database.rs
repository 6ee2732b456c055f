//! Database Connection Management
//!
//! Pooled SQLite connections shared by every store. The schema is created
//! on first open; all statements use `IF NOT EXISTS` so reopening an
//! existing database is a no-op.

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use crate::utils::error::{AppError, AppResult};

/// Shared database handle backed by a connection pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn new(db_path: &Path) -> AppResult<Self> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| AppError::database(format!("failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        info!(path = %db_path.display(), "database ready");
        Ok(db)
    }

    /// In-memory database for tests. A single pooled connection keeps every
    /// caller on the same memory instance.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Check out a pooled connection.
    pub fn get_connection(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("failed to get connection: {}", e)))
    }

    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;
        Self::create_tables(&conn)
    }

    fn create_tables(conn: &Connection) -> AppResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS stream_sessions (
                id          TEXT PRIMARY KEY,
                chat_id     TEXT NOT NULL,
                state       TEXT NOT NULL DEFAULT 'active',
                created_at  TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stream_events (
                session_id  TEXT NOT NULL,
                seq         INTEGER NOT NULL,
                payload     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (session_id, seq)
            );

            CREATE TABLE IF NOT EXISTS documents (
                id          TEXT NOT NULL,
                version     INTEGER NOT NULL,
                chat_id     TEXT NOT NULL,
                kind        TEXT NOT NULL,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (id, version)
            );

            CREATE TABLE IF NOT EXISTS suggestions (
                id              TEXT PRIMARY KEY,
                document_id     TEXT NOT NULL,
                original_text   TEXT NOT NULL,
                suggested_text  TEXT NOT NULL,
                description     TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_stream_sessions_expires
                ON stream_sessions(expires_at);
            CREATE INDEX IF NOT EXISTS idx_suggestions_document
                ON suggestions(document_id);
            ",
        )?;
        Ok(())
    }
}
