//! Code artifact handler.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use loomchat_core::ArtifactKind;

use super::{run_structured_stream, ArtifactHandler, DeltaSink};
use crate::provider::{GenerationProvider, GenerationRequest};
use crate::schema::CompatSchema;
use crate::utils::error::AppResult;

const CREATE_SYSTEM_PROMPT: &str = "Write a self-contained, runnable code snippet \
for the requested topic. Prefer clarity over cleverness. Stream the code as it is \
written in the `code` field.";

const UPDATE_SYSTEM_PROMPT: &str = "Rewrite the given code snippet per the requested \
change, keeping its overall structure where possible. Stream the full updated code \
in the `code` field.";

/// Partial structured payload of a code generation call. The field is
/// optional so early increments validate before the model emits it.
#[derive(Debug, Deserialize, JsonSchema)]
struct CodeStream {
    code: Option<String>,
}

fn contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<CodeStream>)
}

pub struct CodeHandler {
    provider: Arc<dyn GenerationProvider>,
}

impl CodeHandler {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ArtifactHandler for CodeHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Code
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
            "code",
            ArtifactKind::Code,
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
        let prompt = format!("Current code:\n\n{}\n\nChange: {}", current_content, description);
        let request = GenerationRequest::structured(
            prompt,
            UPDATE_SYSTEM_PROMPT,
            contract().legacy_schema().clone(),
        );
        run_structured_stream(
            self.provider.clone(),
            request,
            contract(),
            "code",
            ArtifactKind::Code,
            sink,
            false,
        )
        .await
    }
}
