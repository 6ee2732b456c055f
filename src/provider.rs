//! Generation Provider Interface
//!
//! Defines the common interface for incremental generation backends. The
//! core never talks HTTP itself: a provider is injected into each stream
//! coordinator as an explicit constructor parameter so test doubles can be
//! substituted per session.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::utils::error::{AppError, AppResult};

/// One raw increment from a generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum RawIncrement {
    /// Plain text token(s)
    Text(String),
    /// Partial structured object, shaped by the schema the call was issued
    /// against. Providers may re-send the full snapshot on each increment.
    Structured(Value),
    /// The model invoked a tool with fully accumulated arguments
    ToolCall { name: String, arguments: Value },
}

/// Why the provider stopped emitting increments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Natural end of turn
    EndTurn,
    /// Output token budget exhausted
    MaxTokens,
    /// Provider-specific reason
    Other(String),
}

impl StopReason {
    /// Wire tag carried on the terminal finish event.
    pub fn as_str(&self) -> &str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::MaxTokens => "max_tokens",
            StopReason::Other(s) => s,
        }
    }
}

/// A tool the model may invoke during a generation call.
///
/// `parameters` carries the legacy schema shape produced by
/// [`crate::schema::CompatSchema::legacy_schema`] — this is the one consumer
/// that genuinely requires the old library's object shape.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Parameters for one generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// User-visible prompt
    pub prompt: String,
    /// Optional system prompt
    pub system: Option<String>,
    /// When set, the call streams schema-shaped partial objects instead of
    /// plain text (legacy schema shape, provider-facing)
    pub schema: Option<Value>,
    /// Tools available to the model
    pub tools: Vec<ToolDefinition>,
}

impl GenerationRequest {
    /// Plain text request with just a prompt.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Structured-output request against a schema.
    pub fn structured(prompt: impl Into<String>, system: impl Into<String>, schema: Value) -> Self {
        Self {
            prompt: prompt.into(),
            system: Some(system.into()),
            schema: Some(schema),
            tools: Vec::new(),
        }
    }
}

/// Trait that all generation backends implement.
///
/// A provider streams raw increments into `tx` and returns the stop reason
/// on natural end, or an error on unrecoverable failure. A closed receiver
/// is not an error: the session was cancelled and the provider should just
/// stop.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name for logging and identification.
    fn name(&self) -> &'static str;

    /// Stream one generation call.
    async fn stream(
        &self,
        request: GenerationRequest,
        tx: mpsc::Sender<RawIncrement>,
    ) -> AppResult<StopReason>;
}

// ============================================================================
// Scripted provider (test double)
// ============================================================================

/// One step of a scripted generation call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit this increment
    Emit(RawIncrement),
    /// Fail the call with a provider error after the steps so far
    Fail(String),
}

/// A scripted generation call: the increments to emit and the stop reason.
#[derive(Debug, Clone)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
    pub stop_reason: StopReason,
}

impl Script {
    /// A script that emits the given increments and ends the turn.
    pub fn emitting(increments: Vec<RawIncrement>) -> Self {
        Self {
            steps: increments.into_iter().map(ScriptStep::Emit).collect(),
            stop_reason: StopReason::EndTurn,
        }
    }

    /// A script that emits the given increments and then fails.
    pub fn failing(increments: Vec<RawIncrement>, message: impl Into<String>) -> Self {
        let mut steps: Vec<ScriptStep> = increments.into_iter().map(ScriptStep::Emit).collect();
        steps.push(ScriptStep::Fail(message.into()));
        Self {
            steps,
            stop_reason: StopReason::EndTurn,
        }
    }
}

/// Deterministic provider double that replays pre-recorded scripts.
///
/// Each `stream` call consumes the next queued script, in order — the first
/// script answers the coordinator's top-level call, subsequent scripts
/// answer artifact/suggestion sub-requests in the order they are opened.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next unanswered call.
    pub fn push_script(&self, script: Script) {
        self.scripts
            .lock()
            .expect("script queue poisoned")
            .push_back(script);
    }

    /// Number of scripts not yet consumed.
    pub fn remaining(&self) -> usize {
        self.scripts.lock().expect("script queue poisoned").len()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream(
        &self,
        _request: GenerationRequest,
        tx: mpsc::Sender<RawIncrement>,
    ) -> AppResult<StopReason> {
        let script = self
            .scripts
            .lock()
            .expect("script queue poisoned")
            .pop_front()
            .ok_or_else(|| AppError::provider("scripted provider has no script for this call"))?;

        for step in script.steps {
            match step {
                ScriptStep::Emit(increment) => {
                    // Receiver gone means the session was cancelled.
                    if tx.send(increment).await.is_err() {
                        return Ok(StopReason::Other("cancelled".to_string()));
                    }
                }
                ScriptStep::Fail(message) => return Err(AppError::provider(message)),
            }
        }

        Ok(script.stop_reason)
    }
}
