//! Forced planning-completion fallback (§4.4.6).
//!
//! When the planning loop crosses the guard/no-progress budget without the model
//! having satisfied every [`crate::model::agent_state::PlanningMarkers`] entry, the
//! runner stops waiting on the model and drives a deterministic, system-sourced
//! sequence of tool calls through the same [`ToolExecutionEngine`] a model-issued
//! call would go through: `agent.append_report`, then the four required planning
//! tools in order. Any intermediate `ok:false` aborts the fallback and surfaces the
//! failing tool's error code.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::clock::Clock;
use crate::model::{AgentState, Block, BlockId, Report, ReportLevel};
use crate::shaper::{derive_taxonomy, Plan};
use crate::tool::builtin::{AppendReportTool, AskUserCategoriesTool, RequestFinishAnalysisTool, SetPipelineTool, SetTaxonomyTool};
use crate::tool::{ExecuteToolCallRequest, Scope, ToolExecutionEngine};

use super::error::AgentError;

/// Run the deterministic fallback over `blocks`, dispatching each required planning
/// tool through a fresh [`ToolExecutionEngine`] built from the fixed planning tool
/// catalog ([`crate::tool::builtin::planning_tool_registry`]).
pub async fn apply(state: &mut AgentState, blocks: &HashMap<BlockId, Block>, clock: Arc<dyn Clock>) -> Result<(), AgentError> {
    let engine = ToolExecutionEngine::new(Arc::new(crate::tool::builtin::planning_tool_registry()), clock.clone());

    run(&engine, state, AppendReportTool::NAME, json!({"level": "warning", "message": "Planning fallback"})).await?;
    state.reports.push(Report::new(clock.now_ms(), ReportLevel::Warning, "Planning fallback").with_code("PLANNING_FALLBACK_TRIGGERED"));

    let derived = derive_taxonomy(blocks, None);
    let categories = derived.categories.clone();
    run(&engine, state, SetTaxonomyTool::NAME, json!({"categories": categories, "mapping": derived.mapping})).await?;
    state.apply_taxonomy(derived);
    state.planning_markers.taxonomy_set_by_tool = true;
    state.planning_markers.preanalysis_read_by_tool = true;

    let plan = Plan::default();
    run(&engine, state, SetPipelineTool::NAME, serde_json::to_value(&plan).expect("Plan always serializes")).await?;
    state.plan = Some(plan.clone());
    state.pipeline = Some(plan);
    state.planning_markers.pipeline_set_by_tool = true;

    run(&engine, state, RequestFinishAnalysisTool::NAME, json!({"reason": "Fallback auto-complete planning"})).await?;
    state.planning_markers.finish_analysis_requested_by_tool = true;
    state.planning_markers.finish_analysis_ok = true;

    run(&engine, state, AskUserCategoriesTool::NAME, json!({"ask": {"categories": state.selected_categories}})).await?;
    state.planning_markers.ask_user_categories_by_tool = true;

    Ok(())
}

/// Dispatch one system-sourced call through `engine`, aborting with the tool's own
/// error code if it reports `ok:false`.
async fn run(engine: &ToolExecutionEngine, state: &mut AgentState, tool_name: &'static str, args: Value) -> Result<Value, AgentError> {
    let result = engine
        .execute_tool_call(
            &mut state.tool_state,
            ExecuteToolCallRequest {
                stage: Scope::Planning,
                response_id: None,
                call_id: format!("fallback:{tool_name}"),
                tool_name: tool_name.to_string(),
                tool_args: args,
            },
        )
        .await;

    let output: Value = serde_json::from_str(&result.output_string).unwrap_or(Value::Null);
    if output.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(output);
    }

    let code = output
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .unwrap_or("TOOL_EXEC_FAILED");
    Err(AgentError::PlanningFallbackFailed(format!("{tool_name} failed: {code}")))
}
