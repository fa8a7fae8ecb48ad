//! Tool-state-mismatch recovery (§4.4.7).
//!
//! A model-side error is classified as a mismatch when the transport reports HTTP
//! 400 and either the error code or message names a tool-call/response-chain
//! artifact ([`ModelClientError::is_tool_state_mismatch`]). Recovery drops
//! `previous_response_id` and replaces the pending input with a synthetic summary
//! of where the loop stood, rather than retrying the same chain — "strictly
//! chain-reset, not a retry counter".

use super::loop_record::LoopRecord;
use super::model_client::ModelInputItem;
use crate::tool::{Scope, ToolState};

/// How much of the trace to summarize in the synthetic recovery turn.
const RECENT_TRACE_LIMIT: usize = 12;

/// Build the replacement input for a mismatch-triggered chain reset: a single
/// synthetic user turn summarizing stage, loop progress, the most recent trace
/// entries, and any tool calls still awaiting an ack.
#[must_use]
pub fn build_recovery_input(stage: Scope, record: &LoopRecord, state: &ToolState) -> Vec<ModelInputItem> {
    let recent_trace: Vec<_> = state
        .tool_execution_trace
        .iter()
        .rev()
        .take(RECENT_TRACE_LIMIT)
        .map(|r| serde_json::json!({"tool_name": r.tool_name, "status": r.status, "seq": r.seq}))
        .collect();

    let summary = serde_json::json!({
        "stage": stage,
        "iteration": record.iteration,
        "tool_calls_executed": record.tool_calls_executed,
        "recent_trace": recent_trace,
        "pending_tool_calls": state.pending_tool_calls.keys().collect::<Vec<_>>(),
    });

    vec![ModelInputItem::Message {
        role: "user".to_string(),
        content: format!(
            "The previous response chain was rejected as a tool-state mismatch and has been reset. Here is a summary of where this loop stood: {summary}"
        ),
    }]
}
