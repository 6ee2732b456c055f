//! Suggestion generation sub-task.
//!
//! Runs a structured call against the provider and emits a suggestion event
//! for each completed element of the streamed array. An element counts as
//! complete once both its original and replacement text are present;
//! completed elements are assumed stable across later increments.

use std::sync::{Arc, OnceLock};

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::mpsc;

use loomchat_core::{StreamEvent, Suggestion};

use crate::models::ArtifactDocument;
use crate::provider::{GenerationProvider, GenerationRequest, RawIncrement};
use crate::schema::CompatSchema;
use crate::streaming::parser::StructuredDeltaParser;
use crate::utils::error::{AppError, AppResult};

const SYSTEM_PROMPT: &str = "Review the given document and propose focused writing \
suggestions. Each suggestion replaces one passage of the original text. Stream the \
suggestions array as elements are finished.";

#[derive(Debug, Deserialize, JsonSchema)]
struct SuggestionSeed {
    original_text: Option<String>,
    suggested_text: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SuggestionStream {
    suggestions: Option<Vec<SuggestionSeed>>,
}

fn contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<SuggestionStream>)
}

pub(crate) async fn generate(
    provider: Arc<dyn GenerationProvider>,
    document: &ArtifactDocument,
    sink: &mpsc::Sender<StreamEvent>,
) -> AppResult<Vec<Suggestion>> {
    let prompt = format!("Document '{}':\n\n{}", document.title, document.content);
    let request =
        GenerationRequest::structured(prompt, SYSTEM_PROMPT, contract().legacy_schema().clone());

    let (tx, mut rx) = mpsc::channel::<RawIncrement>(32);
    let call = tokio::spawn(async move { provider.stream(request, tx).await });

    let mut parser = StructuredDeltaParser::new(contract().clone());
    let mut emitted = 0usize;
    let mut out: Vec<Suggestion> = Vec::new();

    while let Some(increment) = rx.recv().await {
        let value = match increment {
            RawIncrement::Structured(value) => value,
            _ => continue,
        };
        for (name, field_value) in parser.feed(&value) {
            if name != "suggestions" {
                continue;
            }
            let seeds: Vec<SuggestionSeed> =
                serde_json::from_value(field_value).unwrap_or_default();
            while emitted < seeds.len() {
                let seed = &seeds[emitted];
                let (Some(original), Some(suggested)) =
                    (&seed.original_text, &seed.suggested_text)
                else {
                    break;
                };
                let suggestion = Suggestion {
                    id: uuid::Uuid::new_v4().to_string(),
                    document_id: document.id.clone(),
                    original_text: original.clone(),
                    suggested_text: suggested.clone(),
                    description: seed.description.clone(),
                };
                let event = StreamEvent::Suggestion {
                    suggestion: suggestion.clone(),
                };
                // Closed sink means the session is shutting down.
                if sink.send(event).await.is_err() {
                    break;
                }
                out.push(suggestion);
                emitted += 1;
            }
        }
    }

    match call.await {
        Ok(Ok(_stop)) => Ok(out),
        Ok(Err(err)) => Err(err),
        Err(err) => Err(AppError::internal(format!(
            "suggestion task panicked: {}",
            err
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Script, ScriptedProvider};
    use loomchat_core::ArtifactKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_emits_completed_elements_incrementally() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_script(Script::emitting(vec![
            RawIncrement::Structured(json!({
                "suggestions": [{"original_text": "teh"}]
            })),
            RawIncrement::Structured(json!({
                "suggestions": [
                    {"original_text": "teh", "suggested_text": "the"},
                    {"original_text": "very unique", "suggested_text": "unique",
                     "description": "redundant intensifier"}
                ]
            })),
        ]));

        let document =
            ArtifactDocument::first_version("d1", "c1", ArtifactKind::Text, "essay", "teh text");
        let (sink, mut rx) = mpsc::channel(16);
        let suggestions = generate(provider, &document, &sink).await.unwrap();

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].suggested_text, "the");
        assert_eq!(suggestions[0].document_id, "d1");
        assert_eq!(
            suggestions[1].description.as_deref(),
            Some("redundant intensifier")
        );

        // One stream event per completed suggestion, none for the partial.
        let mut events = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, StreamEvent::Suggestion { .. }));
            events += 1;
        }
        assert_eq!(events, 2);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_script(Script::failing(vec![], "overloaded"));

        let document =
            ArtifactDocument::first_version("d1", "c1", ArtifactKind::Text, "essay", "text");
        let (sink, _rx) = mpsc::channel(16);
        let err = generate(provider, &document, &sink).await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }
}
