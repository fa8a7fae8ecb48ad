use thiserror::Error;

use crate::error::{ErrorCode, HasErrorCode};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(String),
    #[error("no progress watchdog tripped after {0}ms")]
    NoProgressWatchdog(i64),
    #[error("job lease expired with no recovery path")]
    LeaseExpiredNoRecovery,
    #[error(transparent)]
    Agent(#[from] crate::agent::AgentError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<crate::kv::KvError> for JobError {
    fn from(err: crate::kv::KvError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl HasErrorCode for JobError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::TabGone,
            Self::NoProgressWatchdog(_) => ErrorCode::NoProgressWatchdog,
            Self::LeaseExpiredNoRecovery => ErrorCode::LeaseExpiredNoRecovery,
            Self::Agent(e) => e.code(),
            Self::Storage(_) => ErrorCode::ToolExecFailed,
        }
    }
}
