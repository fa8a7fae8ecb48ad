//! Crate-level error aggregation.
//!
//! Each module owns a [`thiserror`]-derived error enum scoped to its own concerns:
//! [`crate::kv::KvError`], [`crate::transport::TransportError`], [`crate::tool::ToolError`],
//! [`crate::agent::AgentError`], [`crate::job::JobError`], [`crate::settings::SettingsError`].
//! [`Error`] exists only for the handful of call sites — the scheduler step, the CLI
//! demo — that must return one error type across component boundaries.

use thiserror::Error;

use crate::agent::AgentError;
use crate::job::JobError;
use crate::kv::KvError;
use crate::settings::SettingsError;
use crate::tool::ToolError;
use crate::transport::TransportError;

/// Crate-wide result alias for call sites that cross component boundaries.
pub type Result<T> = std::result::Result<T, Error>;

/// Union of every component error, for call sites that cannot stay module-scoped.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Stable, matchable error codes surfaced to callers (external interfaces, §6.5).
///
/// Kept as an enum rather than raw strings so call sites match exhaustively instead of
/// string-comparing.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    PlannerUnavailable,
    ExecutorUnavailable,
    ProofreaderUnavailable,
    ToolRegistryUnavailable,
    AgentLoopGuardStop,
    AgentNoProgress,
    PlanningRequestFailed,
    ExecutionRequestFailed,
    ProofreadingRequestFailed,
    PlanningFallbackFailed,
    PlanningFallbackTaxonomyFailed,
    PlanningFallbackPipelineFailed,
    PlanningFallbackFinishIncomplete,
    PlanningFallbackAskFailed,
    PlanningFallbackError,
    ToolStateMismatchRecovery,
    DroppedOrphanFunctionOutputs,
    ToolArgsInvalid,
    ToolQueueBackpressure,
    ToolPayloadTooLarge,
    ToolExecFailed,
    OffscreenUnavailable,
    OffscreenPortDisconnected,
    OffscreenRequestTimeout,
    OffscreenBackpressure,
    OffscreenRequestLost,
    OffscreenExecuteFailed,
    LeaseExpired,
    LeaseExpiredNoRecovery,
    NoProgressWatchdog,
    TabGone,
    CsNoAck,
    Timeout,
    Aborted,
}

impl ErrorCode {
    /// The wire string used in `lastError.code` and tool-facing error payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlannerUnavailable => "PLANNER_UNAVAILABLE",
            Self::ExecutorUnavailable => "EXECUTOR_UNAVAILABLE",
            Self::ProofreaderUnavailable => "PROOFREADER_UNAVAILABLE",
            Self::ToolRegistryUnavailable => "TOOL_REGISTRY_UNAVAILABLE",
            Self::AgentLoopGuardStop => "AGENT_LOOP_GUARD_STOP",
            Self::AgentNoProgress => "AGENT_NO_PROGRESS",
            Self::PlanningRequestFailed => "PLANNING_REQUEST_FAILED",
            Self::ExecutionRequestFailed => "EXECUTION_REQUEST_FAILED",
            Self::ProofreadingRequestFailed => "PROOFREADING_REQUEST_FAILED",
            Self::PlanningFallbackFailed => "PLANNING_FALLBACK_FAILED",
            Self::PlanningFallbackTaxonomyFailed => "PLANNING_FALLBACK_TAXONOMY_FAILED",
            Self::PlanningFallbackPipelineFailed => "PLANNING_FALLBACK_PIPELINE_FAILED",
            Self::PlanningFallbackFinishIncomplete => "PLANNING_FALLBACK_FINISH_INCOMPLETE",
            Self::PlanningFallbackAskFailed => "PLANNING_FALLBACK_ASK_FAILED",
            Self::PlanningFallbackError => "PLANNING_FALLBACK_ERROR",
            Self::ToolStateMismatchRecovery => "TOOL_STATE_MISMATCH_RECOVERY",
            Self::DroppedOrphanFunctionOutputs => "DROPPED_ORPHAN_FUNCTION_OUTPUTS",
            Self::ToolArgsInvalid => "TOOL_ARGS_INVALID",
            Self::ToolQueueBackpressure => "TOOL_QUEUE_BACKPRESSURE",
            Self::ToolPayloadTooLarge => "TOOL_PAYLOAD_TOO_LARGE",
            Self::ToolExecFailed => "TOOL_EXEC_FAILED",
            Self::OffscreenUnavailable => "OFFSCREEN_UNAVAILABLE",
            Self::OffscreenPortDisconnected => "OFFSCREEN_PORT_DISCONNECTED",
            Self::OffscreenRequestTimeout => "OFFSCREEN_REQUEST_TIMEOUT",
            Self::OffscreenBackpressure => "OFFSCREEN_BACKPRESSURE",
            Self::OffscreenRequestLost => "OFFSCREEN_REQUEST_LOST",
            Self::OffscreenExecuteFailed => "OFFSCREEN_EXECUTE_FAILED",
            Self::LeaseExpired => "LEASE_EXPIRED",
            Self::LeaseExpiredNoRecovery => "LEASE_EXPIRED_NO_RECOVERY",
            Self::NoProgressWatchdog => "NO_PROGRESS_WATCHDOG",
            Self::TabGone => "TAB_GONE",
            Self::CsNoAck => "CS_NO_ACK",
            Self::Timeout => "TIMEOUT",
            Self::Aborted => "ABORTED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every component error so [`crate::job::RetryPolicy`] can classify it
/// without matching on concrete types.
pub trait HasErrorCode {
    fn code(&self) -> ErrorCode;
}
