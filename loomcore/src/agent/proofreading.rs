//! Proofreading phase driver (§4.4.5): drives QC passes under [`Scope::Proofreading`]
//! until `agent.update_checklist` marks [`ChecklistStage::Proofread`] done.

use std::sync::Arc;

use crate::clock::Clock;
use crate::model::AgentState;
use crate::shaper::ChecklistStage;
use crate::tool::{Scope, ToolExecutionEngine, ToolRegistry};

use super::config::AgentRunnerConfig;
use super::error::AgentError;
use super::loop_record::LoopStatus;
use super::model_client::ModelClient;
use super::skeleton::{tick, TickContext};

const PROOFREADING_INSTRUCTIONS: &str =
    "Review the translated blocks against the configured QC level, request audits where warranted, then call agent.update_checklist(proofread) once done.";

pub async fn run_tick(
    state: &mut AgentState,
    model: &dyn ModelClient,
    registry: &Arc<ToolRegistry>,
    engine: &ToolExecutionEngine,
    clock: &dyn Clock,
    config: &AgentRunnerConfig,
) -> Result<bool, AgentError> {
    let record = state.proofreading_execution.get_or_insert_with(|| super::loop_record::LoopRecord::new(clock.now_ms(), config));

    let ctx = TickContext {
        stage: Scope::Proofreading,
        model,
        registry,
        engine,
        clock,
        instructions: PROOFREADING_INSTRUCTIONS,
    };

    for _ in 0..config.max_iterations_per_tick {
        if state.checklist.is_done(ChecklistStage::Proofread) {
            record.status = LoopStatus::Done;
            return Ok(true);
        }
        if record.guard_exceeded() {
            record.status = LoopStatus::GuardStop;
            return Err(AgentError::LoopGuardStop { iterations: record.iteration, tool_calls: record.tool_calls_executed });
        }

        let outcome = tick(&ctx, record, &mut state.tool_state)
            .await
            .map_err(|err| AgentError::ProofreadingRequestFailed(err.to_string()))?;

        if let Some(warning) = outcome.warning {
            state.runner_warnings.push(warning);
        }
        if let Some(warning) = outcome.recovery_warning {
            state.runner_warnings.push(warning);
        }

        if outcome.made_progress {
            record.record_progress();
        } else if record.record_no_progress() {
            record.status = LoopStatus::Failed;
            return Err(AgentError::NoProgress { iterations: record.no_progress_iterations });
        }

        if record.status == LoopStatus::Yielded {
            break;
        }
    }

    Ok(state.checklist.is_done(ChecklistStage::Proofread))
}
