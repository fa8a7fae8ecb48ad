//! [`JobRuntime`]: lease, retry, and watchdog bookkeeping exclusively owned and
//! mutated by [`super::scheduler::JobRunner`] (§3.2, §4.6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRuntime {
    pub lease_owner: Option<String>,
    pub lease_until_ts: Option<i64>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub watchdog_progress_key: Option<String>,
    pub watchdog_last_progress_ts: i64,
}

impl JobRuntime {
    #[must_use]
    pub fn lease_held(&self, now_ms: i64) -> bool {
        self.lease_until_ts.is_some_and(|lease| lease >= now_ms)
    }

    pub fn acquire_lease(&mut self, owner: impl Into<String>, now_ms: i64, duration_ms: i64) {
        self.lease_owner = Some(owner.into());
        self.lease_until_ts = Some(now_ms + duration_ms);
    }

    pub fn release_lease(&mut self) {
        self.lease_owner = None;
        self.lease_until_ts = None;
    }

    /// Compare against the job's latest `progressKey`; returns `true` if it changed
    /// (resets the watchdog clock) and records the new key either way.
    pub fn observe_progress(&mut self, progress_key: &str, now_ms: i64) -> bool {
        let changed = self.watchdog_progress_key.as_deref() != Some(progress_key);
        if changed {
            self.watchdog_progress_key = Some(progress_key.to_string());
            self.watchdog_last_progress_ts = now_ms;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_is_held_only_before_its_expiry() {
        let mut runtime = JobRuntime::default();
        runtime.acquire_lease("runner-1", 0, 1_000);
        assert!(runtime.lease_held(999));
        assert!(!runtime.lease_held(1_001));
    }

    #[test]
    fn observe_progress_resets_the_watchdog_clock_on_change() {
        let mut runtime = JobRuntime::default();
        assert!(runtime.observe_progress("a", 0));
        assert!(!runtime.observe_progress("a", 100));
        assert!(runtime.observe_progress("b", 200));
        assert_eq!(runtime.watchdog_last_progress_ts, 200);
    }
}
