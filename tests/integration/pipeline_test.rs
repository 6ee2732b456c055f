//! End-to-end pipeline tests: session start through artifact persistence.

use serde_json::json;

use loomchat::models::{ArtifactDocument, SessionState};
use loomchat::provider::{RawIncrement, Script};
use loomchat::storage::DocumentPersistence;
use loomchat::{ArtifactKind, StreamEvent};

use crate::common::{collect_until_finish, fixture};

const DOC_ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

#[tokio::test]
async fn test_code_artifact_session_end_to_end() {
    let fx = fixture();

    // Conversational turn that creates a code artifact.
    fx.provider.push_script(Script::emitting(vec![
        RawIncrement::Text("I'll create that for you.".to_string()),
        RawIncrement::ToolCall {
            name: "create_document".to_string(),
            arguments: json!({"title": "Fibonacci", "kind": "code"}),
        },
    ]));
    // The code handler's structured sub-request.
    fx.provider.push_script(Script::emitting(vec![
        RawIncrement::Structured(json!({"code": "def fib"})),
        RawIncrement::Structured(json!({"code": "def fib(n):\n    return n"})),
    ]));

    let handle = fx.service.start_session("chat-1", "write fibonacci").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;
    assert_eq!(
        fx.service.session_state(&handle.session_id).await.unwrap(),
        Some(SessionState::Completed)
    );

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;

    // Every stored event is sequenced contiguously from 1.
    let seqs: Vec<u64> = events.iter().map(|e| e.seq.unwrap()).collect();
    assert_eq!(seqs, (1..=events.len() as u64).collect::<Vec<_>>());

    let kinds: Vec<&str> = events.iter().map(|e| e.event.kind_name()).collect();
    assert_eq!(
        kinds,
        vec![
            "text_delta",
            "artifact_kind_tag",
            "artifact_id",
            "artifact_title",
            "artifact_delta",
            "artifact_delta",
            "finish",
        ]
    );

    // The announced id is the persisted document's id.
    let document_id = match &events[2].event {
        StreamEvent::ArtifactId { document_id } => document_id.clone(),
        other => panic!("expected artifact id, got {:?}", other),
    };
    let document = fx.documents.get_document_by_id(&document_id).await.unwrap().unwrap();
    assert_eq!(document.kind, ArtifactKind::Code);
    assert_eq!(document.title, "Fibonacci");
    assert_eq!(document.version, 1);
    // The growing snapshot replaced the earlier prefix.
    assert_eq!(document.content, "def fib(n):\n    return n");

    assert_eq!(fx.provider.remaining(), 0);
}

#[tokio::test]
async fn test_true_delta_chunks_concatenate_in_order() {
    let fx = fixture();

    fx.provider.push_script(Script::emitting(vec![RawIncrement::ToolCall {
        name: "create_document".to_string(),
        arguments: json!({"title": "Script", "kind": "code"}),
    }]));
    // Fresh deltas rather than growing snapshots: none extends the
    // accumulated body, so they append.
    fx.provider.push_script(Script::emitting(vec![
        RawIncrement::Structured(json!({"code": "print(1)\n"})),
        RawIncrement::Structured(json!({"code": "print(2)\n"})),
        RawIncrement::Structured(json!({"code": "print(3)\n"})),
    ]));

    let handle = fx.service.start_session("chat-1", "script").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;
    let document_id = events
        .iter()
        .find_map(|e| match &e.event {
            StreamEvent::ArtifactId { document_id } => Some(document_id.clone()),
            _ => None,
        })
        .unwrap();

    let document = fx.documents.get_document_by_id(&document_id).await.unwrap().unwrap();
    assert_eq!(document.content, "print(1)\nprint(2)\nprint(3)\n");
}

#[tokio::test]
async fn test_malformed_increments_are_dropped_silently() {
    let fx = fixture();

    fx.provider.push_script(Script::emitting(vec![RawIncrement::ToolCall {
        name: "create_document".to_string(),
        arguments: json!({"title": "Notes", "kind": "text"}),
    }]));
    fx.provider.push_script(Script::emitting(vec![
        RawIncrement::Structured(json!({"text": "Hello"})),
        // Wrong type for the field: dropped, never surfaced.
        RawIncrement::Structured(json!({"text": 42})),
        RawIncrement::Structured(json!({"text": "Hello world"})),
    ]));

    let handle = fx.service.start_session("chat-1", "notes").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;

    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|e| match &e.event {
            StreamEvent::ArtifactDelta { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec!["Hello", "Hello world"]);
    assert!(!events.iter().any(|e| matches!(e.event, StreamEvent::Error { .. })));

    let document_id = events
        .iter()
        .find_map(|e| match &e.event {
            StreamEvent::ArtifactId { document_id } => Some(document_id.clone()),
            _ => None,
        })
        .unwrap();
    let document = fx.documents.get_document_by_id(&document_id).await.unwrap().unwrap();
    assert_eq!(document.content, "Hello world");
}

#[tokio::test]
async fn test_invalid_tool_call_is_visible_but_nonfatal() {
    let fx = fixture();

    fx.provider.push_script(Script::emitting(vec![
        RawIncrement::ToolCall {
            name: "create_document".to_string(),
            // Empty title violates the argument contract.
            arguments: json!({"title": "", "kind": "code"}),
        },
        RawIncrement::Text("Let me answer inline instead.".to_string()),
    ]));

    let handle = fx.service.start_session("chat-1", "hi").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;
    assert_eq!(
        fx.service.session_state(&handle.session_id).await.unwrap(),
        Some(SessionState::Completed)
    );

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;

    let kinds: Vec<&str> = events.iter().map(|e| e.event.kind_name()).collect();
    assert_eq!(kinds, vec!["error", "text_delta", "finish"]);
    assert_eq!(fx.document_rows(), 0);
}

#[tokio::test]
async fn test_update_document_stacks_a_new_version() {
    let fx = fixture();

    let v1 = ArtifactDocument::first_version(
        DOC_ID,
        "chat-1",
        ArtifactKind::Text,
        "Essay",
        "First draft.",
    );
    fx.documents.save_document(&v1).await.unwrap();

    fx.provider.push_script(Script::emitting(vec![RawIncrement::ToolCall {
        name: "update_document".to_string(),
        arguments: json!({"id": DOC_ID, "description": "make it punchier"}),
    }]));
    fx.provider.push_script(Script::emitting(vec![RawIncrement::Structured(
        json!({"text": "Punchier draft."}),
    )]));

    let handle = fx.service.start_session("chat-1", "update it").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;

    // The transient clear never reaches the persisted replay.
    assert!(!events.iter().any(|e| matches!(e.event, StreamEvent::Clear)));
    let kinds: Vec<&str> = events.iter().map(|e| e.event.kind_name()).collect();
    assert_eq!(
        kinds,
        vec![
            "artifact_kind_tag",
            "artifact_id",
            "artifact_title",
            "artifact_delta",
            "finish",
        ]
    );

    let latest = fx.documents.get_document_by_id(DOC_ID).await.unwrap().unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.content, "Punchier draft.");

    // History keeps the prior version intact.
    let versions = fx.documents.list_versions(DOC_ID).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].content, "First draft.");
}

#[tokio::test]
async fn test_update_unknown_document_is_nonfatal() {
    let fx = fixture();

    fx.provider.push_script(Script::emitting(vec![RawIncrement::ToolCall {
        name: "update_document".to_string(),
        arguments: json!({"id": DOC_ID, "description": "anything"}),
    }]));

    let handle = fx.service.start_session("chat-1", "update it").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;
    assert_eq!(
        fx.service.session_state(&handle.session_id).await.unwrap(),
        Some(SessionState::Completed)
    );

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;
    let kinds: Vec<&str> = events.iter().map(|e| e.event.kind_name()).collect();
    assert_eq!(kinds, vec!["error", "finish"]);
}

#[tokio::test]
async fn test_handler_failure_aborts_and_persists_nothing() {
    let fx = fixture();

    fx.provider.push_script(Script::emitting(vec![RawIncrement::ToolCall {
        name: "create_document".to_string(),
        arguments: json!({"title": "Doomed", "kind": "code"}),
    }]));
    fx.provider.push_script(Script::failing(
        vec![RawIncrement::Structured(json!({"code": "partial"}))],
        "upstream overloaded",
    ));

    let handle = fx.service.start_session("chat-1", "doomed").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;
    assert_eq!(
        fx.service.session_state(&handle.session_id).await.unwrap(),
        Some(SessionState::Aborted)
    );

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;

    // The partial delta streamed, then the abort marker closed things out.
    let last_two: Vec<&str> = events[events.len() - 2..]
        .iter()
        .map(|e| e.event.kind_name())
        .collect();
    assert_eq!(last_two, vec!["error", "finish"]);

    // No document row for the half-generated artifact.
    assert_eq!(fx.document_rows(), 0);
}

#[tokio::test]
async fn test_suggestions_stream_and_persist() {
    let fx = fixture();

    let doc = ArtifactDocument::first_version(
        DOC_ID,
        "chat-1",
        ArtifactKind::Text,
        "Essay",
        "teh draft",
    );
    fx.documents.save_document(&doc).await.unwrap();

    fx.provider.push_script(Script::emitting(vec![RawIncrement::ToolCall {
        name: "request_suggestions".to_string(),
        arguments: json!({"document_id": DOC_ID}),
    }]));
    fx.provider.push_script(Script::emitting(vec![RawIncrement::Structured(json!({
        "suggestions": [
            {"original_text": "teh", "suggested_text": "the", "description": "typo"},
        ]
    }))]));

    let handle = fx.service.start_session("chat-1", "review it").await.unwrap();
    fx.wait_terminal(&handle.session_id).await;

    let mut subscription = fx.service.subscribe(&handle.session_id, 0).await.unwrap();
    let events = collect_until_finish(&mut subscription).await;
    let streamed = events
        .iter()
        .find_map(|e| match &e.event {
            StreamEvent::Suggestion { suggestion } => Some(suggestion.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(streamed.original_text, "teh");
    assert_eq!(streamed.document_id, DOC_ID);

    let stored = fx.documents.get_suggestions(DOC_ID).await.unwrap();
    assert_eq!(stored, vec![streamed]);
}
