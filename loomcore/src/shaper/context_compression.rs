//! Pure context-summarization, invoked by the execution loop's auto-compress tick
//! (§4.4.4) and by the `agent.compress_context` tool.

use serde::{Deserialize, Serialize};

use crate::tool::ToolTraceRecord;

/// A bounded textual summary substituted for unbounded turn history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub recent_trace_tail: Vec<String>,
}

/// Recent trace entries to retain verbatim in a [`ContextSummary`].
pub const TRACE_TAIL_LEN: usize = 12;

#[must_use]
pub fn compress_context(completed: usize, failed: usize, pending: usize, trace: &[ToolTraceRecord]) -> ContextSummary {
    let tail_start = trace.len().saturating_sub(TRACE_TAIL_LEN);
    let recent_trace_tail = trace[tail_start..]
        .iter()
        .map(|r| format!("{}:{:?}:{}", r.tool_name, r.status, r.result_preview))
        .collect();
    ContextSummary {
        completed,
        failed,
        pending,
        recent_trace_tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::trace::{TraceQos, TraceStatus};

    fn sample_record(i: u64) -> ToolTraceRecord {
        ToolTraceRecord {
            seq: i,
            ts_start: 0,
            ts_end: 0,
            response_id: None,
            call_id: None,
            stage: None,
            tool_name: format!("tool{i}"),
            tool_version: "1.0.0".into(),
            args_hash: "deadbeef".into(),
            status: TraceStatus::Ok,
            error_code: None,
            result_preview: String::new(),
            qos: TraceQos::default(),
            lease_until_ts: None,
        }
    }

    #[test]
    fn summary_keeps_only_the_trace_tail() {
        let trace: Vec<_> = (0..20).map(sample_record).collect();
        let summary = compress_context(3, 1, 2, &trace);
        assert_eq!(summary.recent_trace_tail.len(), TRACE_TAIL_LEN);
        assert!(summary.recent_trace_tail[0].starts_with("tool8"));
    }
}
