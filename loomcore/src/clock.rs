//! Injectable time source.
//!
//! The loop skeleton and the job scheduler both reason about "now" constantly (leases,
//! backoff, watchdogs, debounce). Routing every read through a [`Clock`] instead of
//! `SystemTime::now()` directly is what lets the coalescing and lease tests in
//! [`crate::tool::engine`] and [`crate::job::scheduler`] drive time deterministically
//! with a [`FakeClock`] rather than sleeping for real.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time, in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall-clock [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// A [`Clock`] whose value only changes when told to, for deterministic tests.
#[derive(Debug)]
pub struct FakeClock {
    now: AtomicI64,
}

impl FakeClock {
    /// Create a fake clock starting at `start_ms`.
    #[must_use]
    pub const fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Advance the clock by `delta_ms` (may be negative) and return the new value.
    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }

    /// Set the clock to an absolute value.
    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_monotonically_under_explicit_control() {
        let clock = FakeClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        assert_eq!(clock.advance(500), 1_500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn system_clock_returns_a_plausible_epoch_value() {
        let clock = SystemClock;
        assert!(clock.now_ms() > 1_700_000_000_000);
    }
}
