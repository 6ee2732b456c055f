//! Shared fixtures for the integration suite.

use std::sync::Arc;
use std::time::Duration;

use loomchat::artifacts::ArtifactKindRegistry;
use loomchat::provider::ScriptedProvider;
use loomchat::storage::{Database, SqliteDocumentStore, SqliteStreamStore, StoreConfig};
use loomchat::streaming::{StreamConfig, StreamService, Subscription};
use loomchat::TransportEvent;

pub struct Fixture {
    pub provider: Arc<ScriptedProvider>,
    pub service: StreamService,
    pub documents: Arc<SqliteDocumentStore>,
    pub store: Arc<SqliteStreamStore>,
    pub database: Database,
}

pub fn fixture() -> Fixture {
    fixture_with_retention(Duration::from_secs(60 * 60))
}

pub fn fixture_with_retention(retention: Duration) -> Fixture {
    let database = Database::new_in_memory().unwrap();
    let provider = Arc::new(ScriptedProvider::new());
    let store = Arc::new(SqliteStreamStore::new(
        database.clone(),
        StoreConfig { retention },
    ));
    let documents = Arc::new(SqliteDocumentStore::new(database.clone()));
    let service = StreamService::new(
        provider.clone(),
        Arc::new(ArtifactKindRegistry::with_provider(provider.clone())),
        store.clone(),
        documents.clone(),
        StreamConfig::default(),
    );
    Fixture {
        provider,
        service,
        documents,
        store,
        database,
    }
}

impl Fixture {
    /// Block until the session's background run has finished and the
    /// service has deregistered it.
    pub async fn wait_terminal(&self, session_id: &str) {
        for _ in 0..500 {
            if !self.service.is_live(session_id) {
                if let Some(state) = self.service.session_state(session_id).await.unwrap() {
                    if state.is_terminal() {
                        return;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session {} did not reach a terminal state", session_id);
    }

    /// Number of rows in the documents table.
    pub fn document_rows(&self) -> i64 {
        let conn = self.database.get_connection().unwrap();
        conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap()
    }
}

/// Drain a subscription up to and including the finish event.
pub async fn collect_until_finish(subscription: &mut Subscription) -> Vec<TransportEvent> {
    let mut events = Vec::new();
    while let Some(event) = subscription.recv().await {
        let terminal = event.event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}
