//! Tool argument contracts.
//!
//! The three tools the model may invoke during a session, each with a
//! derived new-form schema and the translated legacy shape for the
//! provider-facing definitions. Contracts are built once and cached.

use std::sync::OnceLock;

use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

use loomchat_core::ArtifactKind;

use crate::provider::ToolDefinition;
use crate::schema::CompatSchema;

pub const CREATE_DOCUMENT: &str = "create_document";
pub const UPDATE_DOCUMENT: &str = "update_document";
pub const REQUEST_SUGGESTIONS: &str = "request_suggestions";

/// Arguments for `create_document`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateDocumentArgs {
    /// Human-readable document title
    #[schemars(length(min = 1, max = 200))]
    pub title: String,
    /// Artifact kind to create
    #[schemars(schema_with = "artifact_kind_schema")]
    pub kind: ArtifactKind,
}

/// Arguments for `update_document`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDocumentArgs {
    /// Id of the document to update
    #[schemars(schema_with = "uuid_string_schema")]
    pub id: String,
    /// What to change about the document
    #[schemars(length(min = 1))]
    pub description: String,
}

/// Arguments for `request_suggestions`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RequestSuggestionsArgs {
    /// Id of the document to suggest edits for
    #[schemars(schema_with = "uuid_string_schema")]
    pub document_id: String,
}

// ArtifactKind lives in the core crate and does not derive JsonSchema, so
// its schema is spelled out here at the one place that needs it.
fn artifact_kind_schema(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "string",
        "enum": ["code", "text", "image", "sheet"]
    })
}

fn uuid_string_schema(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "string",
        "format": "uuid"
    })
}

/// Cached contract for `create_document` arguments.
pub fn create_document_contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<CreateDocumentArgs>)
}

/// Cached contract for `update_document` arguments.
pub fn update_document_contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<UpdateDocumentArgs>)
}

/// Cached contract for `request_suggestions` arguments.
pub fn request_suggestions_contract() -> &'static CompatSchema {
    static CONTRACT: OnceLock<CompatSchema> = OnceLock::new();
    CONTRACT.get_or_init(CompatSchema::of::<RequestSuggestionsArgs>)
}

/// Provider-facing definitions of all session tools, in stable order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CREATE_DOCUMENT.to_string(),
            description: "Create a new artifact document of the given kind".to_string(),
            parameters: create_document_contract().legacy_schema().clone(),
        },
        ToolDefinition {
            name: UPDATE_DOCUMENT.to_string(),
            description: "Update an existing artifact document".to_string(),
            parameters: update_document_contract().legacy_schema().clone(),
        },
        ToolDefinition {
            name: REQUEST_SUGGESTIONS.to_string(),
            description: "Request edit suggestions for an artifact document".to_string(),
            parameters: request_suggestions_contract().legacy_schema().clone(),
        },
    ]
}
