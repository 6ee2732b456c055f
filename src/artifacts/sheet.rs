//! Sheet artifact handler.
//!
//! Sheet content is CSV text, streamed and stored like any other text body.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use loomchat_core::ArtifactKind;

use super::{run_structured_stream, ArtifactHandler, DeltaSink};
use crate::provider::{GenerationProvider, GenerationRequest};
use crate::schema::CompatSchema;
use crate::utils::error::AppResult;

const CREATE_SYSTEM_PROMPT: &str = "Produce a spreadsheet for the requested topic as \
CSV with a header row. Stream the CSV as it is written in the `csv` field.";

const UPDATE_SYSTEM_PROMPT: &str = "Rewrite the given CSV spreadsheet per the \
requested change, keeping the header row consistent. Stream the full updated CSV \
in the `csv` field.";

#[derive(Debug, Deserialize, JsonSchema)]
struct SheetStream {
    csv: Option<String>,
}

fn contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<SheetStream>)
}

pub struct SheetHandler {
    provider: Arc<dyn GenerationProvider>,
}

impl SheetHandler {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ArtifactHandler for SheetHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Sheet
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
            "csv",
            ArtifactKind::Sheet,
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
            "Current spreadsheet:\n\n{}\n\nChange: {}",
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
            "csv",
            ArtifactKind::Sheet,
            sink,
            false,
        )
        .await
    }
}
