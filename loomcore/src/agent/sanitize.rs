//! Orphan `function_call_output` dropping (§4.4.2).
//!
//! Before every model turn, any `function_call_output` whose `call_id` has no
//! matching prior `function_call` in the same input list is dropped rather than
//! sent upstream — most providers reject a turn containing one. The round-trip
//! law this maintains: sanitizing an already-clean input list is a no-op.

use std::collections::HashSet;

use super::model_client::ModelInputItem;
use crate::model::agent_state::RunnerWarning;

/// Drop orphaned `function_call_output` items, returning the cleaned list and how
/// many were removed.
#[must_use]
pub fn drop_orphan_function_outputs(input: Vec<ModelInputItem>) -> (Vec<ModelInputItem>, usize) {
    let mut seen_calls: HashSet<String> = HashSet::new();
    for item in &input {
        if let ModelInputItem::FunctionCall { call_id, .. } = item {
            seen_calls.insert(call_id.clone());
        }
    }

    let mut dropped = 0;
    let cleaned = input
        .into_iter()
        .filter(|item| match item {
            ModelInputItem::FunctionCallOutput { call_id, .. } => {
                let keep = seen_calls.contains(call_id);
                if !keep {
                    dropped += 1;
                }
                keep
            }
            _ => true,
        })
        .collect();

    (cleaned, dropped)
}

/// Build the [`RunnerWarning`] recorded when sanitizing actually dropped something.
#[must_use]
pub fn orphan_warning(now_ms: i64, dropped: usize) -> RunnerWarning {
    RunnerWarning {
        code: "DROPPED_ORPHAN_FUNCTION_OUTPUTS".to_string(),
        ts: now_ms,
        detail: serde_json::json!({ "count": dropped }),
    }
}
