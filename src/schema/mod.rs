//! Schema Validation Adapter
//!
//! Bridges two incompatible schema-definition forms so the rest of the core
//! can validate inputs/outputs without caring which form produced a schema:
//!
//! - the **new declarative form**: schemas authored with `schemars` v1
//!   derive (JSON Schema 2020-12 dialect — `$defs`, union type arrays,
//!   `const`, `prefixItems`);
//! - the **legacy object shape**: the draft-07-style `Value` that older
//!   tool-calling consumers require (inlined definitions, single `type`
//!   string, `enum` instead of `const`, `anyOf` unions).
//!
//! [`CompatSchema`] wraps one new-form schema and exposes both faces.
//! Validation always runs the strict walker over the *new* form — the
//! legacy shape is load-bearing only for the provider-facing tool
//! definitions and is never the source of truth for acceptance decisions.
//!
//! Construction never fails: node kinds the translator does not recognize
//! degrade to an accept-anything node with a non-fatal diagnostic, because
//! this adapter sits on a hot path during every tool definition.

mod translate;
mod validate;

pub mod tools;

use schemars::{JsonSchema, SchemaGenerator};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::utils::error::AppError;

/// A validation failure, located by JSON path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Payload type does not match the schema type
    #[error("{path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// A required field is absent
    #[error("{path}: missing required field '{field}'")]
    MissingField { path: String, field: String },

    /// A field not allowed by the schema is present
    #[error("{path}: unknown field '{field}'")]
    UnknownField { path: String, field: String },

    /// A refinement constraint failed (length, format, enum, ...)
    #[error("{path}: {message}")]
    Constraint { path: String, message: String },
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// One schema contract, usable from both sides of the version divide.
#[derive(Debug, Clone)]
pub struct CompatSchema {
    /// New-form schema (authoritative for validation)
    source: Value,
    /// Translated legacy shape (for external consumers only)
    legacy: Value,
}

impl CompatSchema {
    /// Build a contract from a type's derived schema.
    pub fn of<T: JsonSchema>() -> Self {
        let schema = SchemaGenerator::default().into_root_schema_for::<T>();
        let source = serde_json::to_value(&schema).unwrap_or(Value::Bool(true));
        Self::from_value(source)
    }

    /// Build a contract from a raw new-form schema value.
    pub fn from_value(source: Value) -> Self {
        let legacy = translate::to_legacy(&source);
        Self { source, legacy }
    }

    /// The new-form schema this contract was built from.
    pub fn source_schema(&self) -> &Value {
        &self.source
    }

    /// The translated legacy shape.
    ///
    /// Hand this to consumers hard-coded against the old library's object
    /// shape (e.g. provider tool definitions). Never use it to accept or
    /// reject payloads — that is what [`CompatSchema::validate`] is for.
    pub fn legacy_schema(&self) -> &Value {
        &self.legacy
    }

    /// Validate a payload against the new-form schema.
    pub fn validate(&self, payload: &Value) -> Result<Value, ValidationError> {
        validate::check(&self.source, payload)?;
        Ok(payload.clone())
    }

    /// Validate, then deserialize into the contract's static type.
    pub fn typed<T: DeserializeOwned>(&self, payload: &Value) -> Result<T, ValidationError> {
        self.validate(payload)?;
        serde_json::from_value(payload.clone()).map_err(|e| ValidationError::Constraint {
            path: "$".to_string(),
            message: e.to_string(),
        })
    }
}
