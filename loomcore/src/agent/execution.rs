//! Execution phase driver (§4.4.4): drives translation batches via tool calls under
//! [`Scope::Execution`] until `agent.update_checklist` marks
//! [`ChecklistStage::ExecuteBatches`] done, auto-compressing context every
//! `config.auto_compress_every` iterations.

use std::sync::Arc;

use crate::clock::Clock;
use crate::model::AgentState;
use crate::shaper::{compress_context, ChecklistStage};
use crate::tool::{Scope, ToolExecutionEngine, ToolRegistry};

use super::config::AgentRunnerConfig;
use super::error::AgentError;
use super::loop_record::LoopStatus;
use super::model_client::ModelClient;
use super::skeleton::{tick, TickContext};

const EXECUTION_INSTRUCTIONS: &str =
    "Translate each block in its assigned batch, call the batch tools as needed, then call agent.update_checklist(execute_batches) once every batch is done.";

pub async fn run_tick(
    state: &mut AgentState,
    model: &dyn ModelClient,
    registry: &Arc<ToolRegistry>,
    engine: &ToolExecutionEngine,
    clock: &dyn Clock,
    config: &AgentRunnerConfig,
) -> Result<bool, AgentError> {
    let record = state.execution.get_or_insert_with(|| super::loop_record::LoopRecord::new(clock.now_ms(), config));

    let ctx = TickContext {
        stage: Scope::Execution,
        model,
        registry,
        engine,
        clock,
        instructions: EXECUTION_INSTRUCTIONS,
    };

    for _ in 0..config.max_iterations_per_tick {
        if state.checklist.is_done(ChecklistStage::ExecuteBatches) {
            record.status = LoopStatus::Done;
            return Ok(true);
        }
        if record.guard_exceeded() {
            record.status = LoopStatus::GuardStop;
            return Err(AgentError::LoopGuardStop { iterations: record.iteration, tool_calls: record.tool_calls_executed });
        }

        let outcome = tick(&ctx, record, &mut state.tool_state)
            .await
            .map_err(|err| AgentError::ExecutionRequestFailed(err.to_string()))?;

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

        if record.auto_compress_every > 0 && record.iteration % record.auto_compress_every == 0 {
            let trace = state.tool_state.tool_execution_trace.clone();
            let completed = trace.iter().filter(|r| matches!(r.status, crate::tool::TraceStatus::Ok)).count();
            let failed = trace.iter().filter(|r| matches!(r.status, crate::tool::TraceStatus::Failed)).count();
            let pending = state.tool_state.pending_tool_calls.len();
            state.context_summary = Some(compress_context(completed, failed, pending, &trace));
        }

        if record.status == LoopStatus::Yielded {
            break;
        }
    }

    Ok(state.checklist.is_done(ChecklistStage::ExecuteBatches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model_client::test_support::ScriptedModel;
    use crate::agent::model_client::{ModelOutputItem, ModelTurnResponse};
    use crate::clock::FakeClock;

    #[tokio::test]
    async fn reports_not_done_until_the_checklist_says_so() {
        let clock = FakeClock::new(0);
        let model = ScriptedModel::new(vec![ModelTurnResponse { response_id: "r1".to_string(), output: vec![ModelOutputItem::Message { content: "working".to_string() }] }]);
        let registry = Arc::new(ToolRegistry::builder().build());
        let engine = ToolExecutionEngine::new(registry.clone(), Arc::new(FakeClock::new(0)));
        let mut state = AgentState::default();
        let config = AgentRunnerConfig::default();

        let done = run_tick(&mut state, &model, &registry, &engine, &clock, &config).await.unwrap();
        assert!(!done);
    }

    #[tokio::test]
    async fn reports_done_once_the_checklist_marks_execute_batches() {
        let clock = FakeClock::new(0);
        let model = ScriptedModel::new(vec![]);
        let registry = Arc::new(ToolRegistry::builder().build());
        let engine = ToolExecutionEngine::new(registry.clone(), Arc::new(FakeClock::new(0)));
        let mut state = AgentState::default();
        state.checklist.mark_done(ChecklistStage::ExecuteBatches);
        let config = AgentRunnerConfig::default();

        let done = run_tick(&mut state, &model, &registry, &engine, &clock, &config).await.unwrap();
        assert!(done);
    }
}
