use thiserror::Error;

use crate::error::{ErrorCode, HasErrorCode};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("worker unavailable: {0}")]
    Unavailable(String),
    #[error("worker port disconnected")]
    PortDisconnected,
    #[error("request timed out after {0}ms")]
    Timeout(i64),
    #[error("dispatch queue full, retry after {wait_ms}ms")]
    Backpressure { wait_ms: i64 },
    #[error("request lost across a worker restart")]
    RequestLost,
    #[error("worker execution failed: {0}")]
    ExecuteFailed(String),
    #[error("request aborted")]
    Aborted,
}

impl HasErrorCode for TransportError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) => ErrorCode::OffscreenUnavailable,
            Self::PortDisconnected => ErrorCode::OffscreenPortDisconnected,
            Self::Timeout(_) => ErrorCode::OffscreenRequestTimeout,
            Self::Backpressure { .. } => ErrorCode::OffscreenBackpressure,
            Self::RequestLost => ErrorCode::OffscreenRequestLost,
            Self::ExecuteFailed(_) => ErrorCode::OffscreenExecuteFailed,
            Self::Aborted => ErrorCode::Aborted,
        }
    }
}
