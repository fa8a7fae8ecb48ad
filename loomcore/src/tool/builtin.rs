//! The five planning tools the forced planning-completion fallback
//! ([`crate::agent::fallback`]) dispatches through the tool execution engine rather
//! than mutating [`crate::model::AgentState`] directly (§4.4.6). A production model
//! would call the same tool names during the happy planning path; the fallback is a
//! deterministic, system-sourced stand-in for that conversation.

use std::collections::HashMap;
use std::convert::Infallible;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{BlockId, Category, ReportLevel};
use crate::shaper::Plan;

use super::definition::{Idempotency, Qos, Scope, SideEffectCategory, ToolDefinition};
use super::registry::ToolRegistry;
use super::traits::Tool;

fn system_definition(name: &'static str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        scope: vec![Scope::Planning],
        parameters,
        idempotency: Idempotency::none(),
        qos: Qos::default(),
        side_effects: SideEffectCategory::None,
        tool_version: "1.0.0".to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AppendReportArgs {
    pub level: ReportLevel,
    pub message: String,
}

pub struct AppendReportTool;

impl Tool for AppendReportTool {
    const NAME: &'static str = "agent.append_report";
    type Error = Infallible;
    type Args = AppendReportArgs;
    type Output = Value;

    async fn definition(&self) -> ToolDefinition {
        system_definition(
            Self::NAME,
            "Appends a structured audit note to the job's report log.",
            json!({"type": "object", "required": ["level", "message"], "properties": {
                "level": {"type": "string"}, "message": {"type": "string"},
            }}),
        )
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(json!({"ok": true}))
    }
}

#[derive(Debug, Deserialize)]
pub struct SetTaxonomyArgs {
    pub categories: Vec<Category>,
    pub mapping: HashMap<BlockId, Category>,
}

pub struct SetTaxonomyTool;

impl Tool for SetTaxonomyTool {
    const NAME: &'static str = "agent.plan.set_taxonomy";
    type Error = Infallible;
    type Args = SetTaxonomyArgs;
    type Output = Value;

    async fn definition(&self) -> ToolDefinition {
        system_definition(
            Self::NAME,
            "Records the block-to-category taxonomy for this job.",
            json!({"type": "object", "required": ["categories", "mapping"], "properties": {
                "categories": {"type": "array"}, "mapping": {"type": "object"},
            }}),
        )
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(json!({"ok": true}))
    }
}

pub struct SetPipelineTool;

impl Tool for SetPipelineTool {
    const NAME: &'static str = "agent.plan.set_pipeline";
    type Error = Infallible;
    type Args = Plan;
    type Output = Value;

    async fn definition(&self) -> ToolDefinition {
        system_definition(
            Self::NAME,
            "Sets the translation pipeline's strategy, glossary, and QC level.",
            json!({"type": "object", "required": ["strategy", "glossary", "qc"], "properties": {
                "strategy": {"type": "string"}, "glossary": {"type": "boolean"}, "qc": {"type": "object"},
            }}),
        )
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(json!({"ok": true}))
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestFinishAnalysisArgs {
    pub reason: String,
}

pub struct RequestFinishAnalysisTool;

impl Tool for RequestFinishAnalysisTool {
    const NAME: &'static str = "agent.plan.request_finish_analysis";
    type Error = Infallible;
    type Args = RequestFinishAnalysisArgs;
    type Output = Value;

    async fn definition(&self) -> ToolDefinition {
        system_definition(
            Self::NAME,
            "Requests that planning be marked finished.",
            json!({"type": "object", "required": ["reason"], "properties": {"reason": {"type": "string"}}}),
        )
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(json!({"ok": true}))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AskUserCategoriesArgs {
    #[serde(default)]
    pub ask: Value,
}

pub struct AskUserCategoriesTool;

impl Tool for AskUserCategoriesTool {
    const NAME: &'static str = "agent.ui.ask_user_categories";
    type Error = Infallible;
    type Args = AskUserCategoriesArgs;
    type Output = Value;

    async fn definition(&self) -> ToolDefinition {
        system_definition(
            Self::NAME,
            "Prompts the user to confirm or adjust the selected categories.",
            json!({"type": "object", "properties": {"ask": {"type": "object"}}}),
        )
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(json!({"ok": true}))
    }
}

/// The fixed planning tool catalog the forced fallback (§4.4.6) dispatches through.
#[must_use]
pub fn planning_tool_registry() -> ToolRegistry {
    ToolRegistry::builder()
        .tool(AppendReportTool)
        .tool(SetTaxonomyTool)
        .tool(SetPipelineTool)
        .tool(RequestFinishAnalysisTool)
        .tool(AskUserCategoriesTool)
        .build()
}
