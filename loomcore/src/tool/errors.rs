use thiserror::Error;

use crate::error::{ErrorCode, HasErrorCode};

/// Errors raised while validating, queueing, or dispatching a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no tool registered under name '{0}'")]
    NotFound(String),

    #[error("tool '{tool_name}' rejected its arguments: {errors:?}")]
    ArgsInvalid {
        tool_name: String,
        errors: Vec<String>,
    },

    #[error("tool '{0}' payload exceeds its maxPayloadBytes limit")]
    PayloadTooLarge(String),

    #[error("tool '{tool_name}' queue is over its depth limit ({limit})")]
    QueueBackpressure { tool_name: String, limit: usize },

    #[error("tool '{tool_name}' failed: {message}")]
    ExecutionFailed { tool_name: String, message: String },

    #[error("failed to (de)serialize tool arguments or output: {0}")]
    Json(#[from] serde_json::Error),
}

impl HasErrorCode for ToolError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::ToolRegistryUnavailable,
            Self::ArgsInvalid { .. } => ErrorCode::ToolArgsInvalid,
            Self::PayloadTooLarge(_) => ErrorCode::ToolPayloadTooLarge,
            Self::QueueBackpressure { .. } => ErrorCode::ToolQueueBackpressure,
            Self::ExecutionFailed { .. } | Self::Json(_) => ErrorCode::ToolExecFailed,
        }
    }
}
