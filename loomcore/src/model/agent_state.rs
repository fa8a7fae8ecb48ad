use serde::{Deserialize, Serialize};

use crate::agent::LoopRecord;
use crate::shaper::{Checklist, ContextSummary, DerivedTaxonomy, Plan};
use crate::tool::ToolState;

use super::{Category, CategoryMapping, Report};

/// Tracks which of the planning phase's mandated tool calls have fired (§4.4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningMarkers {
    pub preanalysis_read_by_tool: bool,
    pub taxonomy_set_by_tool: bool,
    pub pipeline_set_by_tool: bool,
    pub finish_analysis_requested_by_tool: bool,
    pub finish_analysis_ok: bool,
    pub ask_user_categories_by_tool: bool,
}

impl PlanningMarkers {
    /// Names of markers not yet satisfied, in a fixed order, for diagnostic messages.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.preanalysis_read_by_tool {
            missing.push("page.get_preanalysis");
        }
        if !self.taxonomy_set_by_tool {
            missing.push("agent.plan.set_taxonomy");
        }
        if !self.pipeline_set_by_tool {
            missing.push("agent.plan.set_pipeline");
        }
        if !(self.finish_analysis_requested_by_tool && self.finish_analysis_ok) {
            missing.push("agent.plan.request_finish_analysis");
        }
        if !self.ask_user_categories_by_tool {
            missing.push("agent.ui.ask_user_categories");
        }
        missing
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// A bounded, durable warning surfaced by the loop (e.g. `DROPPED_ORPHAN_FUNCTION_OUTPUTS`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerWarning {
    pub code: String,
    pub ts: i64,
    pub detail: serde_json::Value,
}

/// Everything the Agent Runner and Translation Agent State Shaper own on a [`super::Job`]
/// (§3.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub planning_loop: Option<LoopRecord>,
    #[serde(default)]
    pub execution: Option<LoopRecord>,
    #[serde(default)]
    pub proofreading_execution: Option<LoopRecord>,
    #[serde(default)]
    pub planning_markers: PlanningMarkers,
    #[serde(default)]
    pub taxonomy: Option<CategoryMapping>,
    #[serde(default)]
    pub pipeline: Option<Plan>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub glossary: Vec<String>,
    #[serde(default)]
    pub selected_categories: Vec<Category>,
    #[serde(default)]
    pub tool_state: ToolState,
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub checklist: Checklist,
    #[serde(default)]
    pub audits: Vec<Report>,
    #[serde(default)]
    pub context_summary: Option<ContextSummary>,
    #[serde(default)]
    pub runner_warnings: Vec<RunnerWarning>,
}

impl AgentState {
    /// Re-expose the tool execution trace for convenience (delegates to [`ToolState`]).
    #[must_use]
    pub fn tool_execution_trace(&self) -> &[crate::tool::ToolTraceRecord] {
        &self.tool_state.tool_execution_trace
    }

    pub fn apply_taxonomy(&mut self, derived: DerivedTaxonomy) {
        self.selected_categories = derived.categories;
        self.taxonomy = Some(derived.mapping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_markers_missing_lists_everything_by_default() {
        let markers = PlanningMarkers::default();
        assert_eq!(
            markers.missing(),
            vec![
                "page.get_preanalysis",
                "agent.plan.set_taxonomy",
                "agent.plan.set_pipeline",
                "agent.plan.request_finish_analysis",
                "agent.ui.ask_user_categories",
            ]
        );
        assert!(!markers.is_complete());
    }

    #[test]
    fn planning_markers_complete_once_every_flag_set() {
        let markers = PlanningMarkers {
            preanalysis_read_by_tool: true,
            taxonomy_set_by_tool: true,
            pipeline_set_by_tool: true,
            finish_analysis_requested_by_tool: true,
            finish_analysis_ok: true,
            ask_user_categories_by_tool: true,
        };
        assert!(markers.is_complete());
    }
}
