//! Backoff-with-jitter classification for job-runner retries (§4.6).

use crate::error::ErrorCode;

const BASE_BACKOFF_MS: i64 = 1_000;
const MAX_BACKOFF_MS: i64 = 60_000;
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retry after the returned backoff, in milliseconds.
    Retry,
    /// Give up; the job transitions to `failed`.
    Fatal,
}

pub struct RetryPolicy;

impl RetryPolicy {
    /// Whether `code` is worth retrying at all, independent of how many times we
    /// already have. Planner/executor/tool-registry unavailability and timeouts are
    /// transient; malformed-args and guard-stop conditions are not.
    #[must_use]
    pub fn classify(code: ErrorCode) -> Disposition {
        match code {
            ErrorCode::PlannerUnavailable
            | ErrorCode::ExecutorUnavailable
            | ErrorCode::ProofreaderUnavailable
            | ErrorCode::ToolRegistryUnavailable
            | ErrorCode::OffscreenUnavailable
            | ErrorCode::OffscreenPortDisconnected
            | ErrorCode::OffscreenRequestTimeout
            | ErrorCode::OffscreenBackpressure
            | ErrorCode::PlanningRequestFailed
            | ErrorCode::ExecutionRequestFailed
            | ErrorCode::ProofreadingRequestFailed
            | ErrorCode::Timeout => Disposition::Retry,
            _ => Disposition::Fatal,
        }
    }

    /// Exponential backoff with full jitter, capped at [`MAX_BACKOFF_MS`]. Returns
    /// `None` once `attempt` exceeds [`MAX_RETRIES`].
    #[must_use]
    pub fn backoff_ms(attempt: u32) -> Option<i64> {
        if attempt >= MAX_RETRIES {
            return None;
        }
        let exp = BASE_BACKOFF_MS.saturating_mul(1i64 << attempt.min(10)).min(MAX_BACKOFF_MS);
        let jittered = (fastrand::f64() * exp as f64) as i64;
        Some(jittered.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        assert_eq!(RetryPolicy::classify(ErrorCode::PlannerUnavailable), Disposition::Retry);
        assert_eq!(RetryPolicy::classify(ErrorCode::Timeout), Disposition::Retry);
    }

    #[test]
    fn structural_codes_are_fatal() {
        assert_eq!(RetryPolicy::classify(ErrorCode::ToolArgsInvalid), Disposition::Fatal);
        assert_eq!(RetryPolicy::classify(ErrorCode::AgentLoopGuardStop), Disposition::Fatal);
    }

    #[test]
    fn backoff_is_bounded_and_exhausts_after_max_retries() {
        for attempt in 0..MAX_RETRIES {
            let backoff = RetryPolicy::backoff_ms(attempt).unwrap();
            assert!(backoff <= MAX_BACKOFF_MS);
        }
        assert_eq!(RetryPolicy::backoff_ms(MAX_RETRIES), None);
    }
}
