//! Text artifact handler.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use loomchat_core::ArtifactKind;

use super::{run_structured_stream, ArtifactHandler, DeltaSink};
use crate::provider::{GenerationProvider, GenerationRequest};
use crate::schema::CompatSchema;
use crate::utils::error::AppResult;

const CREATE_SYSTEM_PROMPT: &str = "Write a well-structured markdown document about \
the requested topic. Stream the prose as it is written in the `text` field.";

const UPDATE_SYSTEM_PROMPT: &str = "Rewrite the given document per the requested \
change, preserving its voice and structure where possible. Stream the full updated \
document in the `text` field.";

#[derive(Debug, Deserialize, JsonSchema)]
struct TextStream {
    text: Option<String>,
}

fn contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<TextStream>)
}

pub struct TextHandler {
    provider: Arc<dyn GenerationProvider>,
}

impl TextHandler {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ArtifactHandler for TextHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Text
    }

    async fn on_create(&self, title: &str, sink: &DeltaSink) -> AppResult<String> {
        let request = GenerationRequest::structured(
            title,
            CREATE_SYSTEM_PROMPT,
            contract().legacy_schema().clone(),
        );
        run_structured_stream(
            self.provider.clone(),
            request,
            contract(),
            "text",
            ArtifactKind::Text,
            sink,
            false,
        )
        .await
    }

    async fn on_update(
        &self,
        current_content: &str,
        description: &str,
        sink: &DeltaSink,
    ) -> AppResult<String> {
        let prompt = format!(
            "Current document:\n\n{}\n\nChange: {}",
            current_content, description
        );
        let request = GenerationRequest::structured(
            prompt,
            UPDATE_SYSTEM_PROMPT,
            contract().legacy_schema().clone(),
        );
        run_structured_stream(
            self.provider.clone(),
            request,
            contract(),
            "text",
            ArtifactKind::Text,
            sink,
            false,
        )
        .await
    }
}
