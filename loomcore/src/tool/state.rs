//! The tool-execution-owned slice of [`crate::model::AgentState`] (§3.1, §3.2).
//!
//! Everything in [`ToolState`] is exclusively mutated by
//! [`crate::tool::engine::ToolExecutionEngine`]; the agent runner only reads it
//! (e.g. to check whether a `callId` is still pending before echoing its output).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::coalesce::{CoalescedEntry, EntryKey};
use super::trace::ToolTraceRecord;

/// An emitted-but-not-yet-acknowledged tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub tool_name: String,
    pub args_hash: String,
    pub created_ts: i64,
}

/// Whether a cached `callId` output reflects a finished execution or an accepted
/// coalesced/async placeholder still awaiting its real result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Completed,
    AcceptedPending,
}

/// Durable replay cache entry keyed by `callId` (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallIdOutput {
    pub output_string: String,
    pub tool_version: String,
    pub args_hash: String,
    pub ts: i64,
    pub execution_state: ExecutionState,
    pub lease_until_ts: Option<i64>,
}

/// Value-idempotency cache entry keyed by `(toolName, argsHash)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgsHashOutput {
    pub output_string: String,
    pub ts: i64,
}

/// Default lease duration applied to tool outputs with side effects (ms).
pub const DEFAULT_LEASE_MS: i64 = 30_000;

/// Maximum retained length of `toolExecutionTrace` (§3.1).
pub const MAX_TRACE: usize = 500;

/// Every piece of agent state owned by the tool execution engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolState {
    pub pending_tool_calls: HashMap<String, PendingToolCall>,
    pub tool_outputs_by_call_id: HashMap<String, CallIdOutput>,
    pub tool_outputs_by_args_hash: HashMap<String, ArgsHashOutput>,
    pub queue_depth_by_tool: HashMap<String, i64>,
    pub coalesced_pending: HashMap<String, CoalescedEntry>,
    pub tool_execution_trace: Vec<ToolTraceRecord>,
    next_seq: u64,
}

impl ToolState {
    /// Allocate the next trace sequence number.
    pub fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    pub fn queue_depth(&self, tool_name: &str) -> i64 {
        self.queue_depth_by_tool.get(tool_name).copied().unwrap_or(0)
    }

    pub fn incr_queue_depth(&mut self, tool_name: &str) {
        *self.queue_depth_by_tool.entry(tool_name.to_string()).or_insert(0) += 1;
    }

    pub fn decr_queue_depth(&mut self, tool_name: &str) {
        let depth = self.queue_depth_by_tool.entry(tool_name.to_string()).or_insert(0);
        *depth = (*depth - 1).max(0);
    }

    pub fn push_trace(&mut self, mut record: ToolTraceRecord) {
        record.seq = self.next_seq();
        self.tool_execution_trace.push(record);
        if self.tool_execution_trace.len() > MAX_TRACE {
            let overflow = self.tool_execution_trace.len() - MAX_TRACE;
            self.tool_execution_trace.drain(0..overflow);
        }
    }

    /// Composite key for [`Self::coalesced_pending`] — a tool name paired with the
    /// coalesce key's string value.
    #[must_use]
    pub fn entry_key(tool_name: &str, key_value: &str) -> String {
        format!("{tool_name}\u{1f}{key_value}")
    }

    #[must_use]
    pub fn decode_entry_key(entry_key: &str) -> Option<EntryKey> {
        let (tool_name, key_value) = entry_key.split_once('\u{1f}')?;
        Some((tool_name.to_string(), key_value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_depth_inc_dec_are_balanced() {
        let mut state = ToolState::default();
        state.incr_queue_depth("t");
        state.incr_queue_depth("t");
        state.decr_queue_depth("t");
        assert_eq!(state.queue_depth("t"), 1);
        state.decr_queue_depth("t");
        assert_eq!(state.queue_depth("t"), 0);
    }

    #[test]
    fn queue_depth_never_goes_negative() {
        let mut state = ToolState::default();
        state.decr_queue_depth("t");
        assert_eq!(state.queue_depth("t"), 0);
    }

    #[test]
    fn trace_is_bounded_and_monotonically_sequenced() {
        let mut state = ToolState::default();
        for i in 0..(MAX_TRACE + 10) {
            state.push_trace(ToolTraceRecord {
                seq: 0,
                ts_start: i as i64,
                ts_end: i as i64,
                response_id: None,
                call_id: None,
                stage: None,
                tool_name: "t".into(),
                tool_version: "1.0.0".into(),
                args_hash: "deadbeef".into(),
                status: super::super::trace::TraceStatus::Ok,
                error_code: None,
                result_preview: String::new(),
                qos: super::super::trace::TraceQos::default(),
                lease_until_ts: None,
            });
        }
        assert_eq!(state.tool_execution_trace.len(), MAX_TRACE);
        let seqs: Vec<u64> = state.tool_execution_trace.iter().map(|r| r.seq).collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn entry_key_round_trips() {
        let key = ToolState::entry_key("page.apply_delta", "b42");
        assert_eq!(
            ToolState::decode_entry_key(&key),
            Some(("page.apply_delta".to_string(), "b42".to_string()))
        );
    }
}
