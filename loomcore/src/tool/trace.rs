use serde::{Deserialize, Serialize};

use crate::tool::definition::Scope;

/// Outcome recorded for one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Ok,
    Failed,
    Skipped,
    Coalesced,
}

/// QoS figures attached to a trace record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceQos {
    pub queue_depth: usize,
    pub debounce_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coalesced_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
}

/// `ToolTraceRecord v1` (§6.2). The canonical external record of one tool
/// invocation, appended to `agentState.toolExecutionTrace` in strictly increasing
/// `seq` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTraceRecord {
    pub seq: u64,
    pub ts_start: i64,
    pub ts_end: i64,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub stage: Option<Scope>,
    pub tool_name: String,
    pub tool_version: String,
    pub args_hash: String,
    pub status: TraceStatus,
    #[serde(default)]
    pub error_code: Option<String>,
    pub result_preview: String,
    pub qos: TraceQos,
    #[serde(default)]
    pub lease_until_ts: Option<i64>,
}

/// Result previews are capped at 280 characters (§6.2).
pub const RESULT_PREVIEW_MAX: usize = 280;

/// Truncate `s` to [`RESULT_PREVIEW_MAX`] characters on a char boundary.
#[must_use]
pub fn preview(s: &str) -> String {
    if s.chars().count() <= RESULT_PREVIEW_MAX {
        return s.to_string();
    }
    s.chars().take(RESULT_PREVIEW_MAX).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_to_280_chars() {
        let long = "a".repeat(400);
        assert_eq!(preview(&long).chars().count(), RESULT_PREVIEW_MAX);
    }

    #[test]
    fn preview_leaves_short_strings_untouched() {
        assert_eq!(preview("short"), "short");
    }
}
