//! Stream store tests: durability, expiry, and the sequencing contract as
//! seen through the service surface.

use std::time::Duration;

use loomchat::models::Session;
use loomchat::provider::{RawIncrement, Script};
use loomchat::storage::{Database, ResumableStreamStore, SqliteStreamStore, StoreConfig};
use loomchat::utils::error::AppError;
use loomchat::{SequencedEvent, StreamEvent};

use crate::common::fixture_with_retention;

#[tokio::test]
async fn test_events_survive_database_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("streams.db");
    let session = Session::new("chat-1");

    {
        let store = SqliteStreamStore::new(Database::new(&path).unwrap(), StoreConfig::default());
        store.register(&session).await.unwrap();
        for (seq, content) in [(1, "a"), (2, "b")] {
            store
                .append(
                    &session.id,
                    &SequencedEvent::new(
                        seq,
                        StreamEvent::TextDelta {
                            content: content.to_string(),
                        },
                    ),
                )
                .await
                .unwrap();
        }
    }

    // A fresh process sees the same stream.
    let store = SqliteStreamStore::new(Database::new(&path).unwrap(), StoreConfig::default());
    let events = store.read_from(&session.id, 0).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].seq, 1);
    assert_eq!(
        events[1].event,
        StreamEvent::TextDelta {
            content: "b".to_string()
        }
    );
}

#[tokio::test]
async fn test_expired_session_reads_not_found_and_purges() {
    let fx = fixture_with_retention(Duration::from_secs(0));
    fx.provider
        .push_script(Script::emitting(vec![RawIncrement::Text("a".to_string())]));

    let handle = fx.service.start_session("chat-1", "go").await.unwrap();

    // The session expires the moment it is registered, so wait on the
    // service map rather than the (already unreadable) store state.
    for _ in 0..500 {
        if !fx.service.is_live(&handle.session_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let err = fx.service.subscribe(&handle.session_id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(
        fx.service.session_state(&handle.session_id).await.unwrap(),
        None
    );

    assert_eq!(fx.service.purge_expired().await.unwrap(), 1);

    // Purging removes the events too, not just the session row.
    let conn = fx.database.get_connection().unwrap();
    let events: i64 = conn
        .query_row("SELECT COUNT(*) FROM stream_events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(events, 0);
}

#[tokio::test]
async fn test_store_rejects_out_of_order_writers() {
    let fx = fixture_with_retention(Duration::from_secs(3600));
    let session = Session::new("chat-1");
    fx.store.register(&session).await.unwrap();

    let text = |content: &str| StreamEvent::TextDelta {
        content: content.to_string(),
    };

    fx.store
        .append(&session.id, &SequencedEvent::new(1, text("a")))
        .await
        .unwrap();

    // A stale writer re-sending seq 1 is rejected, as is a gap.
    for bad_seq in [1, 3] {
        let err = fx
            .store
            .append(&session.id, &SequencedEvent::new(bad_seq, text("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }

    // The contract keeps accepting the one correct next sequence.
    fx.store
        .append(&session.id, &SequencedEvent::new(2, text("b")))
        .await
        .unwrap();
    let events = fx.store.read_from(&session.id, 0).await.unwrap();
    assert_eq!(events.len(), 2);
}
