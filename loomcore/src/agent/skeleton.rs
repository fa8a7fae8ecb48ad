//! Common loop skeleton shared by the three phase drivers (§4.4.1).
//!
//! Each tick: sanitize the pending input, recover any awaiting-ack calls, send one
//! model turn, execute every emitted tool call through the [`ToolExecutionEngine`],
//! append their outputs back into the pending input, and update progress/watchdog
//! counters. [`planning`], [`execution`], and [`proofreading`] each wrap this with
//! their own completion predicate, instructions, and guard budgets.

use std::sync::Arc;

use crate::clock::Clock;
use crate::tool::{ExecuteToolCallRequest, Scope, ToolExecutionEngine, ToolRegistry, ToolState};

use super::loop_record::{LoopRecord, LoopStatus};
use super::mismatch;
use super::model_client::{ModelClient, ModelClientError, ModelInputItem, ModelOutputItem, ModelTurnRequest};
use super::recovery::build_recovery_input;
use super::sanitize::{drop_orphan_function_outputs, orphan_warning};
use crate::model::agent_state::RunnerWarning;

/// Everything a single tick of the skeleton needs besides the [`LoopRecord`]/[`ToolState`]
/// it mutates in place.
pub struct TickContext<'a> {
    pub stage: Scope,
    pub model: &'a dyn ModelClient,
    pub registry: &'a Arc<ToolRegistry>,
    pub engine: &'a ToolExecutionEngine,
    pub clock: &'a dyn Clock,
    pub instructions: &'a str,
}

/// Outcome of one tick: whether the loop should keep running, and any warnings to
/// append to [`crate::model::AgentState::runner_warnings`].
pub struct TickOutcome {
    pub made_progress: bool,
    pub warning: Option<RunnerWarning>,
    pub recovery_warning: Option<RunnerWarning>,
}

/// Run a single tick of the loop skeleton against `record`/`state`.
pub async fn tick(ctx: &TickContext<'_>, record: &mut LoopRecord, state: &mut ToolState) -> Result<TickOutcome, ModelClientError> {
    let now = ctx.clock.now_ms();

    let recovered = build_recovery_input(state, &record.awaiting_ack_call_ids, now);
    record.awaiting_ack_call_ids.retain(|id| !recovered.iter().any(|item| matches!(item, ModelInputItem::FunctionCallOutput { call_id, .. } if call_id == id)));

    let mut input: Vec<ModelInputItem> = record
        .pending_input_items
        .drain(..)
        .filter_map(|v| serde_json::from_value(v).ok())
        .chain(recovered)
        .collect();

    let (cleaned, dropped) = drop_orphan_function_outputs(std::mem::take(&mut input));
    input = cleaned;
    let warning = (dropped > 0).then(|| orphan_warning(now, dropped));

    let tools = ctx.registry.get_tools_spec(ctx.stage).await;

    // §4.4.1's "on toolStateMismatch" / "on other error" branches. A mismatch is a
    // chain reset (not gated by stepAttempt); any other error consumes a step
    // attempt and only fails the loop once maxStepAttempts is exhausted.
    let mut recovery_warning = None;
    let response = loop {
        let request = ModelTurnRequest {
            stage: ctx.stage,
            previous_response_id: record.previous_response_id.clone(),
            input: input.clone(),
            tools: tools.clone(),
            instructions: ctx.instructions.to_string(),
        };

        match ctx.model.turn(request).await {
            Ok(response) => break response,
            Err(err) if err.is_tool_state_mismatch() && record.previous_response_id.is_some() => {
                record.recovery_attempts += 1;
                record.previous_response_id = None;
                input = mismatch::build_recovery_input(ctx.stage, record, state);
                record.step_attempt = 1;
                recovery_warning = Some(RunnerWarning {
                    code: "TOOL_STATE_MISMATCH_RECOVERY".to_string(),
                    ts: ctx.clock.now_ms(),
                    detail: serde_json::json!({ "recovery_attempts": record.recovery_attempts, "message": err.message }),
                });
            }
            Err(err) => {
                if record.step_attempt < record.max_step_attempts {
                    record.step_attempt += 1;
                } else {
                    record.status = LoopStatus::Failed;
                    return Err(err);
                }
            }
        }
    };
    record.step_attempt = 1;

    record.previous_response_id = record.last_response_id.take();
    record.last_response_id = Some(response.response_id.clone());
    record.iteration += 1;
    record.updated_at = ctx.clock.now_ms();

    let mut made_progress = false;
    for item in response.output {
        match item {
            ModelOutputItem::Message { content } => {
                record.pending_input_items.push(serde_json::to_value(ModelInputItem::Message { role: "assistant".to_string(), content }).unwrap());
            }
            ModelOutputItem::FunctionCall { call_id, name, arguments } => {
                record.awaiting_ack_call_ids.push(call_id.clone());
                let result = ctx
                    .engine
                    .execute_tool_call(
                        state,
                        ExecuteToolCallRequest {
                            stage: ctx.stage,
                            response_id: Some(response.response_id.clone()),
                            call_id: call_id.clone(),
                            tool_name: name,
                            tool_args: arguments,
                        },
                    )
                    .await;
                record.tool_calls_executed += 1;
                record.awaiting_ack_call_ids.retain(|id| id != &call_id);
                record.pending_input_items.push(
                    serde_json::to_value(ModelInputItem::FunctionCallOutput { call_id, output: result.output_string }).unwrap(),
                );
                made_progress = true;
            }
        }
    }

    if record.pending_input_items.is_empty() && !made_progress {
        record.status = LoopStatus::Yielded;
    }

    Ok(TickOutcome { made_progress, warning, recovery_warning })
}
