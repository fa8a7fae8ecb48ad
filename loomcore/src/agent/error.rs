//! Errors surfaced by the agent runner's three phase drivers (§4.4, §7).

use thiserror::Error;

use crate::error::{ErrorCode, HasErrorCode};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("planner unavailable: {0}")]
    PlannerUnavailable(String),
    #[error("executor unavailable: {0}")]
    ExecutorUnavailable(String),
    #[error("proofreader unavailable: {0}")]
    ProofreaderUnavailable(String),
    #[error("loop guard stop after {iterations} iterations / {tool_calls} tool calls")]
    LoopGuardStop { iterations: usize, tool_calls: usize },
    #[error("no progress after {iterations} consecutive iterations")]
    NoProgress { iterations: u32 },
    #[error("planning model turn failed: {0}")]
    PlanningRequestFailed(String),
    #[error("execution model turn failed: {0}")]
    ExecutionRequestFailed(String),
    #[error("proofreading model turn failed: {0}")]
    ProofreadingRequestFailed(String),
    #[error("forced planning-completion fallback failed: {0}")]
    PlanningFallbackFailed(String),
}

impl HasErrorCode for AgentError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::PlannerUnavailable(_) => ErrorCode::PlannerUnavailable,
            Self::ExecutorUnavailable(_) => ErrorCode::ExecutorUnavailable,
            Self::ProofreaderUnavailable(_) => ErrorCode::ProofreaderUnavailable,
            Self::LoopGuardStop { .. } => ErrorCode::AgentLoopGuardStop,
            Self::NoProgress { .. } => ErrorCode::AgentNoProgress,
            Self::PlanningRequestFailed(_) => ErrorCode::PlanningRequestFailed,
            Self::ExecutionRequestFailed(_) => ErrorCode::ExecutionRequestFailed,
            Self::ProofreadingRequestFailed(_) => ErrorCode::ProofreadingRequestFailed,
            Self::PlanningFallbackFailed(_) => ErrorCode::PlanningFallbackFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_guard_stop_maps_to_its_error_code() {
        let err = AgentError::LoopGuardStop { iterations: 20, tool_calls: 5 };
        assert_eq!(err.code(), ErrorCode::AgentLoopGuardStop);
    }
}
