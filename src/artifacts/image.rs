//! Image artifact handler.
//!
//! Image content is a base64 payload. Unlike the text-like kinds, each
//! increment carries a complete re-render, so chunks always replace the
//! accumulated body.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use loomchat_core::ArtifactKind;

use super::{run_structured_stream, ArtifactHandler, DeltaSink};
use crate::provider::{GenerationProvider, GenerationRequest};
use crate::schema::CompatSchema;
use crate::utils::error::AppResult;

const CREATE_SYSTEM_PROMPT: &str = "Generate an image for the requested topic. Emit \
the base64-encoded image data in the `image` field.";

const UPDATE_SYSTEM_PROMPT: &str = "Regenerate the image per the requested change. \
Emit the base64-encoded image data in the `image` field.";

#[derive(Debug, Deserialize, JsonSchema)]
struct ImageStream {
    image: Option<String>,
}

fn contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<ImageStream>)
}

pub struct ImageHandler {
    provider: Arc<dyn GenerationProvider>,
}

impl ImageHandler {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ArtifactHandler for ImageHandler {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Image
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
            "image",
            ArtifactKind::Image,
            sink,
            true,
        )
        .await
    }

    async fn on_update(
        &self,
        _current_content: &str,
        description: &str,
        sink: &DeltaSink,
    ) -> AppResult<String> {
        let request = GenerationRequest::structured(
            description,
            UPDATE_SYSTEM_PROMPT,
            contract().legacy_schema().clone(),
        );
        run_structured_stream(
            self.provider.clone(),
            request,
            contract(),
            "image",
            ArtifactKind::Image,
            sink,
            true,
        )
        .await
    }
}
