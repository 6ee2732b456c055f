//! Artifact Kind Registry
//!
//! Maps each artifact kind to its handler. A handler owns the generation
//! logic for one kind: it issues structured sub-requests against the
//! injected provider and feeds content chunks back into the session through
//! its delta sink. The coordinator only ever talks to handlers through the
//! [`ArtifactHandler`] trait.

mod code;
mod image;
mod sheet;
mod text;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use loomchat_core::{ArtifactKind, StreamEvent};

pub use code::CodeHandler;
pub use image::ImageHandler;
pub use sheet::SheetHandler;
pub use text::TextHandler;

use crate::provider::{GenerationProvider, GenerationRequest, RawIncrement};
use crate::schema::CompatSchema;
use crate::streaming::parser::StructuredDeltaParser;
use crate::utils::error::{AppError, AppResult};

/// Channel a handler emits content chunk events into. The coordinator owns
/// the receiving end and folds these into the session's ordered stream.
pub type DeltaSink = mpsc::Sender<StreamEvent>;

/// Generation logic for one artifact kind.
///
/// Both operations return the full final content for persistence; chunks
/// emitted along the way through the sink are for live subscribers.
#[async_trait]
pub trait ArtifactHandler: Send + Sync {
    /// The kind this handler produces.
    fn kind(&self) -> ArtifactKind;

    /// Generate initial content for a newly created document.
    async fn on_create(&self, title: &str, sink: &DeltaSink) -> AppResult<String>;

    /// Regenerate content for an existing document per the description.
    async fn on_update(
        &self,
        current_content: &str,
        description: &str,
        sink: &DeltaSink,
    ) -> AppResult<String>;
}

/// Registry of artifact handlers, one per kind.
pub struct ArtifactKindRegistry {
    handlers: HashMap<ArtifactKind, Arc<dyn ArtifactHandler>>,
    order: Vec<ArtifactKind>,
}

impl ArtifactKindRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry with the four built-in kinds wired to the given provider.
    pub fn with_provider(provider: Arc<dyn GenerationProvider>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextHandler::new(provider.clone())));
        registry.register(Arc::new(CodeHandler::new(provider.clone())));
        registry.register(Arc::new(ImageHandler::new(provider.clone())));
        registry.register(Arc::new(SheetHandler::new(provider)));
        registry
    }

    /// Register a handler. A second registration for the same kind replaces
    /// the first and keeps the original position.
    pub fn register(&mut self, handler: Arc<dyn ArtifactHandler>) {
        let kind = handler.kind();
        if self.handlers.insert(kind, handler).is_none() {
            self.order.push(kind);
        }
    }

    /// Look up the handler for a kind.
    pub fn get(&self, kind: ArtifactKind) -> AppResult<Arc<dyn ArtifactHandler>> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::config(format!("no handler registered for kind '{}'", kind)))
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> Vec<ArtifactKind> {
        self.order.clone()
    }
}

impl Default for ArtifactKindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold a content chunk into the accumulated body.
///
/// Providers re-send either a growing snapshot or a fresh delta on each
/// increment: a chunk that extends the accumulated text replaces it,
/// anything else is appended.
pub fn merge_content(accumulated: &mut String, chunk: &str) {
    if chunk.starts_with(accumulated.as_str()) {
        accumulated.clear();
        accumulated.push_str(chunk);
    } else {
        accumulated.push_str(chunk);
    }
}

/// Drive one structured generation call and stream one string field of it.
///
/// Spawns the provider call, parses its structured increments against
/// `contract`, and emits an artifact chunk event for each change to `field`.
/// Returns the full accumulated content. With `replace_only` each chunk
/// replaces the body outright instead of merging (image data has no
/// meaningful prefix relation).
pub(crate) async fn run_structured_stream(
    provider: Arc<dyn GenerationProvider>,
    request: GenerationRequest,
    contract: &CompatSchema,
    field: &'static str,
    kind: ArtifactKind,
    sink: &DeltaSink,
    replace_only: bool,
) -> AppResult<String> {
    let (tx, mut rx) = mpsc::channel::<RawIncrement>(32);
    let call = tokio::spawn(async move { provider.stream(request, tx).await });

    let mut parser = StructuredDeltaParser::new(contract.clone());
    let mut accumulated = String::new();

    while let Some(increment) = rx.recv().await {
        let value = match increment {
            RawIncrement::Structured(value) => value,
            // Structured calls only carry structured increments.
            _ => continue,
        };
        for (name, field_value) in parser.feed(&value) {
            if name != field {
                continue;
            }
            let chunk = match field_value.as_str() {
                Some(s) => s.to_string(),
                None => continue,
            };
            if replace_only {
                accumulated = chunk.clone();
            } else {
                merge_content(&mut accumulated, &chunk);
            }
            let event = StreamEvent::ArtifactDelta {
                kind,
                content: chunk,
            };
            // Closed sink means the session is shutting down.
            if sink.send(event).await.is_err() {
                break;
            }
        }
    }

    match call.await {
        Ok(Ok(_stop)) => Ok(accumulated),
        Ok(Err(err)) => Err(err),
        Err(err) => Err(AppError::internal(format!(
            "artifact generation task panicked: {}",
            err
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Script, ScriptedProvider};
    use serde_json::json;

    #[test]
    fn test_merge_snapshot_replaces() {
        let mut acc = "fn main".to_string();
        merge_content(&mut acc, "fn main() {}");
        assert_eq!(acc, "fn main() {}");
    }

    #[test]
    fn test_merge_delta_appends() {
        let mut acc = "Hello".to_string();
        merge_content(&mut acc, " world");
        assert_eq!(acc, "Hello world");
    }

    #[test]
    fn test_merge_into_empty_replaces() {
        let mut acc = String::new();
        merge_content(&mut acc, "start");
        assert_eq!(acc, "start");
    }

    #[test]
    fn test_registry_has_all_builtin_kinds() {
        let provider: Arc<dyn GenerationProvider> = Arc::new(ScriptedProvider::new());
        let registry = ArtifactKindRegistry::with_provider(provider);
        for kind in ArtifactKind::all() {
            assert!(registry.get(kind).is_ok());
        }
        assert_eq!(registry.kinds().len(), 4);
    }

    #[test]
    fn test_registry_missing_kind_is_config_error() {
        let registry = ArtifactKindRegistry::new();
        let err = registry.get(ArtifactKind::Code).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_code_handler_streams_and_accumulates() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_script(Script::emitting(vec![
            RawIncrement::Structured(json!({"code": "fn main"})),
            RawIncrement::Structured(json!({"code": "fn main() {}"})),
        ]));

        let handler = CodeHandler::new(provider);
        let (sink, mut rx) = mpsc::channel(16);
        let content = handler.on_create("Fibonacci", &sink).await.unwrap();

        assert_eq!(content, "fn main() {}");
        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            StreamEvent::ArtifactDelta { kind: ArtifactKind::Code, ref content } if content == "fn main"
        ));
    }

    #[tokio::test]
    async fn test_handler_propagates_provider_failure() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_script(Script::failing(
            vec![RawIncrement::Structured(json!({"text": "partial"}))],
            "connection reset",
        ));

        let handler = TextHandler::new(provider);
        let (sink, _rx) = mpsc::channel(16);
        let err = handler.on_create("Notes", &sink).await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[tokio::test]
    async fn test_image_handler_replaces_instead_of_merging() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_script(Script::emitting(vec![
            RawIncrement::Structured(json!({"image": "AAAA"})),
            RawIncrement::Structured(json!({"image": "BBBB"})),
        ]));

        let handler = ImageHandler::new(provider);
        let (sink, _rx) = mpsc::channel(16);
        let content = handler.on_create("Logo", &sink).await.unwrap();
        assert_eq!(content, "BBBB");
    }
}
