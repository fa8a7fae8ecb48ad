//! Planning phase driver (§4.4.3): runs the loop skeleton under [`Scope::Planning`]
//! until every [`crate::model::agent_state::PlanningMarkers`] entry is satisfied, the
//! per-tick iteration budget is spent, or the phase's guard trips — at which point the
//! forced fallback in [`super::fallback`] takes over.

use std::sync::Arc;

use crate::clock::Clock;
use crate::model::AgentState;
use crate::tool::{Scope, ToolExecutionEngine, ToolRegistry};

use super::config::AgentRunnerConfig;
use super::error::AgentError;
use super::loop_record::LoopStatus;
use super::model_client::ModelClient;
use super::skeleton::{tick, TickContext};

const PLANNING_INSTRUCTIONS: &str = concat!(
    "You are planning a page translation job. Call page.get_preanalysis, ",
    "agent.plan.set_taxonomy, agent.plan.set_pipeline, agent.ui.ask_user_categories, ",
    "then agent.plan.request_finish_analysis once every prior call has succeeded.",
);

/// Drive the planning phase for up to `config.max_iterations_per_tick` iterations of
/// one scheduler tick. Returns `Ok(true)` once every planning marker is satisfied.
pub async fn run_tick(
    state: &mut AgentState,
    model: &dyn ModelClient,
    registry: &Arc<ToolRegistry>,
    engine: &ToolExecutionEngine,
    clock: &dyn Clock,
    config: &AgentRunnerConfig,
) -> Result<bool, AgentError> {
    let record = state.planning_loop.get_or_insert_with(|| super::loop_record::LoopRecord::new(clock.now_ms(), config));

    let ctx = TickContext {
        stage: Scope::Planning,
        model,
        registry,
        engine,
        clock,
        instructions: PLANNING_INSTRUCTIONS,
    };

    for _ in 0..config.max_iterations_per_tick {
        if state.planning_markers.is_complete() {
            record.status = LoopStatus::Done;
            return Ok(true);
        }
        if record.guard_exceeded() {
            record.status = LoopStatus::GuardStop;
            return Err(AgentError::LoopGuardStop { iterations: record.iteration, tool_calls: record.tool_calls_executed });
        }

        let outcome = tick(&ctx, record, &mut state.tool_state)
            .await
            .map_err(|err| AgentError::PlanningRequestFailed(err.to_string()))?;

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

    Ok(state.planning_markers.is_complete())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model_client::test_support::ScriptedModel;
    use crate::agent::model_client::{ModelOutputItem, ModelTurnResponse};
    use crate::clock::FakeClock;

    #[tokio::test]
    async fn yields_without_error_when_the_model_only_talks() {
        let clock = FakeClock::new(0);
        let model = ScriptedModel::new(vec![ModelTurnResponse { response_id: "r1".to_string(), output: vec![ModelOutputItem::Message { content: "thinking".to_string() }] }]);
        let registry = Arc::new(ToolRegistry::builder().build());
        let engine = ToolExecutionEngine::new(registry.clone(), Arc::new(FakeClock::new(0)));
        let mut state = AgentState::default();
        let config = AgentRunnerConfig::default();

        let done = run_tick(&mut state, &model, &registry, &engine, &clock, &config).await.unwrap();
        assert!(!done);
        assert!(!state.planning_markers.is_complete());
    }

    #[tokio::test]
    async fn a_tool_state_mismatch_resets_the_chain_and_the_loop_recovers() {
        use crate::agent::model_client::ModelClientError;

        let clock = FakeClock::new(0);
        let talk_only = ModelTurnResponse { response_id: "r2".to_string(), output: vec![ModelOutputItem::Message { content: "thinking".to_string() }] };
        let model = ScriptedModel::new_results(vec![
            Err(ModelClientError::http(400, "previous_response_id not found")),
            Ok(talk_only),
        ]);
        let registry = Arc::new(ToolRegistry::builder().build());
        let engine = ToolExecutionEngine::new(registry.clone(), Arc::new(FakeClock::new(0)));
        let mut state = AgentState::default();
        let config = AgentRunnerConfig { max_iterations_per_tick: 1, ..AgentRunnerConfig::default() };
        let record = state.planning_loop.get_or_insert_with(|| super::super::loop_record::LoopRecord::new(0, &config));
        record.last_response_id = Some("r1".to_string());
        record.previous_response_id = Some("r0".to_string());

        let done = run_tick(&mut state, &model, &registry, &engine, &clock, &config).await.unwrap();
        assert!(!done);
        assert_eq!(state.planning_loop.as_ref().unwrap().recovery_attempts, 1);
        assert!(state.runner_warnings.iter().any(|w| w.code == "TOOL_STATE_MISMATCH_RECOVERY"));
    }
}
