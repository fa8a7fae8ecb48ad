//! Injectable seam between the agent runner and whatever turns text + tool
//! definitions into tool calls (§4.4, §6.1). Production wiring plugs in a
//! provider-backed client; tests plug in a scripted one.

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tool::{Scope, ToolDefinition};

/// One item in the model-facing turn history: either a prior function call, its
/// output, or a plain message, matching §6.1's input-item union.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelInputItem {
    Message { role: String, content: String },
    FunctionCall { call_id: String, name: String, arguments: Value },
    FunctionCallOutput { call_id: String, output: String },
}

/// One item the model emitted in a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelOutputItem {
    Message { content: String },
    FunctionCall { call_id: String, name: String, arguments: Value },
}

/// A single request/response turn against the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTurnRequest {
    pub stage: Scope,
    pub previous_response_id: Option<String>,
    pub input: Vec<ModelInputItem>,
    pub tools: Vec<ToolDefinition>,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTurnResponse {
    pub response_id: String,
    pub output: Vec<ModelOutputItem>,
}

/// A failed model turn, carrying enough of the transport error to let the loop
/// skeleton classify it as a tool-state mismatch (§4.4.7) rather than a plain
/// retryable failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ModelClientError {
    pub http_status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

impl ModelClientError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self { http_status: None, code: None, message: message.into() }
    }

    #[must_use]
    pub fn http(http_status: u16, message: impl Into<String>) -> Self {
        Self { http_status: Some(http_status), code: None, message: message.into() }
    }

    /// Tool-state mismatch per §4.4.7: HTTP 400 and either `code` mentions "tool" or
    /// the message mentions a call-id/response-chain artifact.
    #[must_use]
    pub fn is_tool_state_mismatch(&self) -> bool {
        if self.http_status != Some(400) {
            return false;
        }
        let code_hits = self.code.as_deref().is_some_and(|c| c.to_lowercase().contains("tool"));
        let message = self.message.to_lowercase();
        let message_hits = ["tool call", "tool output", "call_id", "previous_response_id", "previous response"]
            .iter()
            .any(|needle| message.contains(needle));
        code_hits || message_hits
    }
}

type BoxedFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Object-safe turn-taking seam. Implementors own retries against whatever
/// transport backs them; the runner only sees success or a classifiable error.
pub trait ModelClient: Send + Sync {
    fn turn<'a>(&'a self, request: ModelTurnRequest) -> BoxedFuture<'a, Result<ModelTurnResponse, ModelClientError>>;
}
