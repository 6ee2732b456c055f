//! Resumable subscription tests: late attach, disconnect cursors, replay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use loomchat::artifacts::ArtifactKindRegistry;
use loomchat::provider::{
    GenerationProvider, GenerationRequest, RawIncrement, Script, StopReason,
};
use loomchat::storage::{
    Database, ResumableStreamStore, SqliteDocumentStore, SqliteStreamStore, StoreConfig,
};
use loomchat::streaming::{StreamConfig, StreamService};
use loomchat::utils::error::{AppError, AppResult};

use crate::common::{collect_until_finish, fixture};

/// Provider that pauses mid-stream until released, so tests can attach a
/// subscriber at a known point.
struct GatedProvider {
    release: Arc<Notify>,
}

#[async_trait]
impl GenerationProvider for GatedProvider {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn stream(
        &self,
        _request: GenerationRequest,
        tx: mpsc::Sender<RawIncrement>,
    ) -> AppResult<StopReason> {
        for chunk in ["one", "two"] {
            tx.send(RawIncrement::Text(chunk.to_string()))
                .await
                .map_err(|_| AppError::provider("receiver dropped"))?;
        }
        self.release.notified().await;
        tx.send(RawIncrement::Text("three".to_string()))
            .await
            .map_err(|_| AppError::provider("receiver dropped"))?;
        Ok(StopReason::EndTurn)
    }
}

#[tokio::test]
async fn test_late_subscriber_splices_replay_into_live_feed() {
    let release = Arc::new(Notify::new());
    let provider = Arc::new(GatedProvider {
        release: release.clone(),
    });

    let database = Database::new_in_memory().unwrap();
    let store = Arc::new(SqliteStreamStore::new(
        database.clone(),
        StoreConfig::default(),
    ));
    let service = StreamService::new(
        provider,
        Arc::new(ArtifactKindRegistry::new()),
        store.clone(),
        Arc::new(SqliteDocumentStore::new(database)),
        StreamConfig::default(),
    );

    let handle = service.start_session("chat-1", "go").await.unwrap();

    // Wait for the first two events to be persisted.
    loop {
        match store.read_from(&handle.session_id, 0).await {
            Ok(events) if events.len() >= 2 => break,
            _ => tokio::time::sleep(Duration::from_millis(5)).await,
        }
    }

    // Attach mid-stream with a cursor past the first event, then let the
    // provider finish.
    let mut subscription = service.subscribe(&handle.session_id, 1).await.unwrap();
    release.notify_one();

    let events = collect_until_finish(&mut subscription).await;
    let seqs: Vec<u64> = events.iter().map(|e| e.seq.unwrap()).collect();
    // Exactly once, in order, no gap between replayed and live events.
    assert_eq!(seqs, vec![2, 3, 4]);
}

#[tokio::test]
async fn test_resume_cursor_skips_already_seen_events() {
    let fx = fixture();
    fx.provider.push_script(Script::emitting(vec![
        RawIncrement::Text("a".to_string()),
        RawIncrement::Text("b".to_string()),
        RawIncrement::Text("c".to_string()),
    ]));

    let handle = fx.service.start_session("chat-1", "go").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;

    // Client saw seq 1-2 before disconnecting.
    let mut subscription = fx.service.subscribe(&handle.session_id, 2).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;
    let seqs: Vec<u64> = events.iter().map(|e| e.seq.unwrap()).collect();
    assert_eq!(seqs, vec![3, 4]);
}

#[tokio::test]
async fn test_replay_is_idempotent() {
    let fx = fixture();
    fx.provider.push_script(Script::emitting(vec![
        RawIncrement::Text("a".to_string()),
        RawIncrement::Text("b".to_string()),
    ]));

    let handle = fx.service.start_session("chat-1", "go").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;

    let mut first = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let mut second = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    assert_eq!(
        collect_until_finish(&mut first).await,
        collect_until_finish(&mut second).await
    );
}

#[tokio::test]
async fn test_subscribe_past_end_yields_nothing_but_succeeds() {
    let fx = fixture();
    fx.provider
        .push_script(Script::emitting(vec![RawIncrement::Text("a".to_string())]));

    let handle = fx.service.start_session("chat-1", "go").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;

    let mut subscription = fx.service.subscribe(&handle.session_id, 99).await.unwrap();
    assert!(subscription.recv().await.is_none());
}
