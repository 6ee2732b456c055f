//! Resumable Stream Store
//!
//! Durable, ordered log of persisted session events. The store enforces the
//! gap-free sequencing contract at the write path: an append whose sequence
//! number is not exactly `last + 1` is rejected, as is any append to a
//! session that already reached a terminal state. Sessions expire after a
//! retention window and disappear from both reads and writes before they
//! are purged.

use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use loomchat_core::{SequencedEvent, StreamEvent};

use crate::models::{Session, SessionState};
use crate::storage::Database;
use crate::utils::error::{AppError, AppResult};
use crate::utils::time::{expires_at, now_rfc3339, now_unix};

/// Store tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a session's events remain readable after registration.
    pub retention: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(60 * 60),
        }
    }
}

/// Persistence seam for resumable session streams.
#[async_trait]
pub trait ResumableStreamStore: Send + Sync {
    /// Register a new session before its first event.
    async fn register(&self, session: &Session) -> AppResult<()>;

    /// Append one persisted event. The event's sequence number must be
    /// exactly one past the last appended sequence (starting at 1).
    /// Expired sessions reject appends the same way reads do.
    async fn append(&self, session_id: &str, event: &SequencedEvent) -> AppResult<()>;

    /// All persisted events with `seq > after_seq`, in sequence order.
    /// Expired or unknown sessions read as not found.
    async fn read_from(&self, session_id: &str, after_seq: u64) -> AppResult<Vec<SequencedEvent>>;

    /// Completion state of a session, or `None` if it is unknown/expired.
    async fn session_state(&self, session_id: &str) -> AppResult<Option<SessionState>>;

    /// Transition an active session to a terminal state.
    async fn mark_terminal(&self, session_id: &str, state: SessionState) -> AppResult<()>;

    /// Delete sessions (and their events) past their retention window.
    /// Returns the number of sessions removed.
    async fn purge_expired(&self) -> AppResult<u64>;
}

/// SQLite-backed stream store.
pub struct SqliteStreamStore {
    database: Database,
    config: StoreConfig,
}

impl SqliteStreamStore {
    pub fn new(database: Database, config: StoreConfig) -> Self {
        Self { database, config }
    }
}

#[async_trait]
impl ResumableStreamStore for SqliteStreamStore {
    async fn register(&self, session: &Session) -> AppResult<()> {
        let conn = self.database.get_connection()?;
        conn.execute(
            "INSERT INTO stream_sessions (id, chat_id, state, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.chat_id,
                session.state.as_str(),
                session.created_at,
                expires_at(self.config.retention),
            ],
        )?;
        Ok(())
    }

    async fn append(&self, session_id: &str, event: &SequencedEvent) -> AppResult<()> {
        let mut conn = self.database.get_connection()?;
        let tx = conn.transaction()?;

        let row: Option<(String, i64)> = tx
            .query_row(
                "SELECT state, expires_at FROM stream_sessions WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (state, expires) = row
            .ok_or_else(|| AppError::not_found(format!("unknown session: {}", session_id)))?;
        if expires <= now_unix() {
            return Err(AppError::not_found(format!(
                "session expired: {}",
                session_id
            )));
        }
        if state.parse::<SessionState>()?.is_terminal() {
            return Err(AppError::store(format!(
                "cannot append to terminal session {}",
                session_id
            )));
        }

        let last: Option<i64> = tx.query_row(
            "SELECT MAX(seq) FROM stream_events WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        let expected = last.unwrap_or(0) as u64 + 1;
        if event.seq != expected {
            return Err(AppError::store(format!(
                "sequence violation on session {}: expected {}, got {}",
                session_id, expected, event.seq
            )));
        }

        tx.execute(
            "INSERT INTO stream_events (session_id, seq, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                event.seq as i64,
                serde_json::to_string(&event.event)?,
                now_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn read_from(&self, session_id: &str, after_seq: u64) -> AppResult<Vec<SequencedEvent>> {
        let conn = self.database.get_connection()?;

        let expires: Option<i64> = conn
            .query_row(
                "SELECT expires_at FROM stream_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        match expires {
            None => {
                return Err(AppError::not_found(format!(
                    "unknown session: {}",
                    session_id
                )))
            }
            Some(expires) if expires <= now_unix() => {
                return Err(AppError::not_found(format!(
                    "session expired: {}",
                    session_id
                )))
            }
            Some(_) => {}
        }

        let mut stmt = conn.prepare(
            "SELECT seq, payload FROM stream_events
             WHERE session_id = ?1 AND seq > ?2
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![session_id, after_seq as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (seq, payload) = row?;
            let event: StreamEvent = serde_json::from_str(&payload)?;
            events.push(SequencedEvent::new(seq as u64, event));
        }
        Ok(events)
    }

    async fn session_state(&self, session_id: &str) -> AppResult<Option<SessionState>> {
        let conn = self.database.get_connection()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT state, expires_at FROM stream_sessions WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((_, expires)) if expires <= now_unix() => Ok(None),
            Some((state, _)) => Ok(Some(state.parse()?)),
            None => Ok(None),
        }
    }

    async fn mark_terminal(&self, session_id: &str, state: SessionState) -> AppResult<()> {
        if !state.is_terminal() {
            return Err(AppError::store(format!(
                "'{}' is not a terminal state",
                state.as_str()
            )));
        }

        let conn = self.database.get_connection()?;
        let updated = conn.execute(
            "UPDATE stream_sessions SET state = ?1 WHERE id = ?2 AND state = 'active'",
            params![state.as_str(), session_id],
        )?;

        if updated == 0 {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM stream_sessions WHERE id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(AppError::not_found(format!(
                    "unknown session: {}",
                    session_id
                )));
            }
            debug!(session_id, "session already terminal");
        }
        Ok(())
    }

    async fn purge_expired(&self) -> AppResult<u64> {
        let mut conn = self.database.get_connection()?;
        let tx = conn.transaction()?;
        let now = now_unix();

        tx.execute(
            "DELETE FROM stream_events WHERE session_id IN
             (SELECT id FROM stream_sessions WHERE expires_at <= ?1)",
            params![now],
        )?;
        let purged = tx.execute(
            "DELETE FROM stream_sessions WHERE expires_at <= ?1",
            params![now],
        )?;
        tx.commit()?;

        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }
        Ok(purged as u64)
    }
}
