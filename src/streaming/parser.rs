//! Delta Parser
//!
//! Turns raw structured increments into per-field change sets. Every
//! increment is validated against its contract before anything is emitted;
//! malformed increments are dropped and counted, never surfaced to
//! subscribers. The parser also decodes tool invocations against the tool
//! argument contracts.

use serde_json::Value;
use tracing::debug;

use crate::schema::tools::{
    self, CreateDocumentArgs, RequestSuggestionsArgs, UpdateDocumentArgs, CREATE_DOCUMENT,
    REQUEST_SUGGESTIONS, UPDATE_DOCUMENT,
};
use crate::schema::{CompatSchema, ValidationError};

/// Stateful parser over one structured increment stream.
///
/// Providers re-send the full partial object on each increment; the parser
/// diffs against the previous snapshot and yields only the fields whose
/// value actually changed.
pub struct StructuredDeltaParser {
    contract: CompatSchema,
    previous: Option<Value>,
    dropped: u64,
}

impl StructuredDeltaParser {
    pub fn new(contract: CompatSchema) -> Self {
        Self {
            contract,
            previous: None,
            dropped: 0,
        }
    }

    /// Feed one increment. Returns the changed `(field, value)` pairs, or
    /// nothing if the increment fails validation.
    pub fn feed(&mut self, increment: &Value) -> Vec<(String, Value)> {
        if let Err(err) = self.contract.validate(increment) {
            self.dropped += 1;
            debug!(error = %err, "dropping malformed structured increment");
            return Vec::new();
        }

        let fields = match increment.as_object() {
            Some(fields) => fields,
            None => return Vec::new(),
        };

        let changed: Vec<(String, Value)> = fields
            .iter()
            .filter(|(name, value)| {
                !value.is_null()
                    && self
                        .previous
                        .as_ref()
                        .and_then(|p| p.get(name.as_str()))
                        .is_none_or(|prior| prior != *value)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        self.previous = Some(increment.clone());
        changed
    }

    /// Increments dropped for failing validation so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Forget the previous snapshot (for reuse across calls).
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

// ============================================================================
// Tool invocations
// ============================================================================

/// A decoded, validated tool invocation.
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    CreateDocument(CreateDocumentArgs),
    UpdateDocument(UpdateDocumentArgs),
    RequestSuggestions(RequestSuggestionsArgs),
}

/// Decode a raw tool call against the matching argument contract.
pub fn parse_tool_call(name: &str, arguments: &Value) -> Result<ToolInvocation, ValidationError> {
    match name {
        CREATE_DOCUMENT => tools::create_document_contract()
            .typed(arguments)
            .map(ToolInvocation::CreateDocument),
        UPDATE_DOCUMENT => tools::update_document_contract()
            .typed(arguments)
            .map(ToolInvocation::UpdateDocument),
        REQUEST_SUGGESTIONS => tools::request_suggestions_contract()
            .typed(arguments)
            .map(ToolInvocation::RequestSuggestions),
        other => Err(ValidationError::Constraint {
            path: "$".to_string(),
            message: format!("unknown tool '{}'", other),
        }),
    }
}
