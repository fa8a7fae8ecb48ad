//! Awaiting-ack reconciliation on resume (§4.4.1's `ack(loop.awaitingAckCallIds)`).
//!
//! On resume after a restart, `awaitingAckCallIds` may list calls whose outcome
//! the tool engine already knows (because the output landed before the crash) or
//! that are still genuinely pending. This module classifies each call and builds
//! the `function_call_output` items needed to bring the model's view back in sync
//! before the loop resumes. This is distinct from the tool-state-mismatch chain
//! reset in [`super::mismatch`] (§4.4.7), which reacts to a model-reported error
//! rather than to calls left over from a crash.

use serde::{Deserialize, Serialize};

use super::model_client::ModelInputItem;
use crate::tool::state::ExecutionState;
use crate::tool::ToolState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryClass {
    /// A completed output already exists; replay it.
    Known,
    /// Still accepted-pending with a live lease; keep waiting.
    StillPending,
    /// Pending but the lease has expired with no output; treat as lost.
    Lost,
}

#[must_use]
pub fn classify(state: &ToolState, call_id: &str, now_ms: i64) -> RecoveryClass {
    match state.tool_outputs_by_call_id.get(call_id) {
        Some(out) if out.execution_state == ExecutionState::Completed => RecoveryClass::Known,
        Some(out) => match out.lease_until_ts {
            Some(lease) if lease >= now_ms => RecoveryClass::StillPending,
            _ => RecoveryClass::Lost,
        },
        None => RecoveryClass::Lost,
    }
}

/// Build the ack reconciliation items for every call still awaiting an ack.
/// `Known` calls replay their real output; `Lost` calls synthesize a
/// `LEASE_EXPIRED` error output; `StillPending` calls are left out of the
/// returned list entirely (the loop keeps waiting).
#[must_use]
pub fn build_recovery_input(state: &ToolState, awaiting_ack_call_ids: &[String], now_ms: i64) -> Vec<ModelInputItem> {
    let mut items = Vec::new();
    for call_id in awaiting_ack_call_ids {
        match classify(state, call_id, now_ms) {
            RecoveryClass::Known => {
                if let Some(out) = state.tool_outputs_by_call_id.get(call_id) {
                    items.push(ModelInputItem::FunctionCallOutput {
                        call_id: call_id.clone(),
                        output: out.output_string.clone(),
                    });
                }
            }
            RecoveryClass::Lost => {
                let body = serde_json::json!({
                    "ok": false,
                    "error": { "code": "LEASE_EXPIRED", "message": "tool lease expired before an outcome was recorded" },
                })
                .to_string();
                items.push(ModelInputItem::FunctionCallOutput { call_id: call_id.clone(), output: body });
            }
            RecoveryClass::StillPending => {}
        }
    }
    items
}
