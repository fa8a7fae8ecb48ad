//! Per-phase loop bookkeeping (§3.1 `LoopRecord`, §4.4).

use serde::{Deserialize, Serialize};

/// Status of one phase's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Running,
    Yielded,
    Stopped,
    Done,
    GuardStop,
    Failed,
}

impl LoopStatus {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Durable, restart-safe record of one phase's (planning/execution/proofreading)
/// progress through the common loop skeleton (§4.4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopRecord {
    pub status: LoopStatus,
    pub iteration: usize,
    pub step_attempt: u32,
    pub tool_calls_executed: usize,
    pub max_steps: usize,
    pub max_tool_calls: usize,
    pub max_iterations_per_tick: usize,
    pub max_step_attempts: u32,
    pub max_no_progress_iterations: u32,
    pub no_progress_iterations: u32,
    pub previous_response_id: Option<String>,
    pub last_response_id: Option<String>,
    pub awaiting_ack_call_ids: Vec<String>,
    pub pending_input_items: Vec<serde_json::Value>,
    pub recovery_attempts: u32,
    pub auto_compress_every: usize,
    pub started_at: i64,
    pub updated_at: i64,
    pub last_error: Option<String>,
}

impl LoopRecord {
    #[must_use]
    pub fn new(now_ms: i64, config: &super::config::AgentRunnerConfig) -> Self {
        Self {
            status: LoopStatus::Running,
            iteration: 0,
            step_attempt: 1,
            tool_calls_executed: 0,
            max_steps: config.max_steps,
            max_tool_calls: config.max_tool_calls,
            max_iterations_per_tick: config.max_iterations_per_tick,
            max_step_attempts: config.max_step_attempts,
            max_no_progress_iterations: config.max_no_progress_iterations,
            no_progress_iterations: 0,
            previous_response_id: None,
            last_response_id: None,
            awaiting_ack_call_ids: Vec::new(),
            pending_input_items: Vec::new(),
            recovery_attempts: 0,
            auto_compress_every: config.auto_compress_every,
            started_at: now_ms,
            updated_at: now_ms,
            last_error: None,
        }
    }

    /// Guard-stop condition: step or tool-call budget exhausted (§4.4.1).
    #[must_use]
    pub const fn guard_exceeded(&self) -> bool {
        self.iteration >= self.max_steps || self.tool_calls_executed >= self.max_tool_calls
    }

    /// Reset the no-progress watchdog on observed progress.
    pub fn record_progress(&mut self) {
        self.no_progress_iterations = 0;
    }

    /// Advance the watchdog on a turn that made no progress; returns `true` once the
    /// configured ceiling is reached.
    pub fn record_no_progress(&mut self) -> bool {
        self.no_progress_iterations += 1;
        self.no_progress_iterations >= self.max_no_progress_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::AgentRunnerConfig;

    #[test]
    fn guard_exceeded_trips_on_either_counter() {
        let mut record = LoopRecord::new(0, &AgentRunnerConfig::default());
        record.iteration = record.max_steps;
        assert!(record.guard_exceeded());
    }

    #[test]
    fn no_progress_watchdog_trips_at_the_configured_ceiling() {
        let mut record = LoopRecord::new(0, &AgentRunnerConfig { max_no_progress_iterations: 2, ..AgentRunnerConfig::default() });
        assert!(!record.record_no_progress());
        assert!(record.record_no_progress());
    }

    #[test]
    fn progress_resets_the_watchdog() {
        let mut record = LoopRecord::new(0, &AgentRunnerConfig { max_no_progress_iterations: 2, ..AgentRunnerConfig::default() });
        record.record_no_progress();
        record.record_progress();
        assert_eq!(record.no_progress_iterations, 0);
    }
}
