//! Stream Service
//!
//! The application-facing surface over sessions: start a generation run,
//! subscribe (or re-subscribe) to its stream, cancel it, and sweep expired
//! sessions. Live sessions are tracked in a concurrent map; terminal ones
//! are served straight from the store as replay-only subscriptions.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::artifacts::ArtifactKindRegistry;
use crate::models::{Session, SessionState};
use crate::provider::GenerationProvider;
use crate::storage::{DocumentPersistence, ResumableStreamStore};
use crate::streaming::coordinator::{
    SessionHandle, StreamConfig, StreamCoordinator, Subscription,
};
use crate::utils::error::{AppError, AppResult};

pub struct StreamService {
    provider: Arc<dyn GenerationProvider>,
    registry: Arc<ArtifactKindRegistry>,
    store: Arc<dyn ResumableStreamStore>,
    documents: Arc<dyn DocumentPersistence>,
    config: StreamConfig,
    active: Arc<DashMap<String, SessionHandle>>,
}

impl StreamService {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        registry: Arc<ArtifactKindRegistry>,
        store: Arc<dyn ResumableStreamStore>,
        documents: Arc<dyn DocumentPersistence>,
        config: StreamConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            store,
            documents,
            config,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Start a session for the given chat and prompt. Returns its handle;
    /// the run itself proceeds in the background until terminal.
    pub async fn start_session(
        &self,
        chat_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> AppResult<SessionHandle> {
        let session = Session::new(chat_id);
        let coordinator = StreamCoordinator::new(
            session.clone(),
            self.provider.clone(),
            self.registry.clone(),
            self.store.clone(),
            self.documents.clone(),
            self.config.clone(),
        );
        let handle = coordinator.handle();
        self.active.insert(session.id.clone(), handle.clone());

        let active = self.active.clone();
        let session_id = session.id.clone();
        let prompt = prompt.into();
        tokio::spawn(async move {
            match coordinator.run(prompt).await {
                Ok(state) => {
                    info!(session_id = %session_id, state = state.as_str(), "session finished")
                }
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "session failed")
                }
            }
            active.remove(&session_id);
        });

        Ok(handle)
    }

    /// Subscribe to a session from a resumption cursor (`0` for the full
    /// stream). Live sessions splice replay into the live feed; terminal
    /// sessions yield a finite replay of their persisted events.
    pub async fn subscribe(&self, session_id: &str, after_seq: u64) -> AppResult<Subscription> {
        if let Some(handle) = self.active.get(session_id) {
            return handle.subscribe(after_seq).await;
        }

        match self.store.session_state(session_id).await? {
            Some(_) => {
                let events = self.store.read_from(session_id, after_seq).await?;
                Ok(Subscription::replay(events))
            }
            None => Err(AppError::not_found(format!(
                "unknown session: {}",
                session_id
            ))),
        }
    }

    /// Request cancellation of a live session. Unknown or already-terminal
    /// sessions are a no-op.
    pub fn cancel(&self, session_id: &str) {
        if let Some(handle) = self.active.get(session_id) {
            handle.cancel();
        }
    }

    /// Whether a session is still tracked as live.
    pub fn is_live(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id)
    }

    /// Completion state of a session, or `None` if unknown/expired.
    pub async fn session_state(&self, session_id: &str) -> AppResult<Option<SessionState>> {
        self.store.session_state(session_id).await
    }

    /// Sweep expired sessions out of the store.
    pub async fn purge_expired(&self) -> AppResult<u64> {
        self.store.purge_expired().await
    }
}
