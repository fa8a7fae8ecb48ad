//! Tool registry: holds every tool callable by the agent and answers
//! `getToolsSpec(scope)` / `execute(name, args)` (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::definition::{Scope, ToolDefinition};
use super::errors::ToolError;
use super::traits::ToolDyn;

/// Collection of registered tools, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn add_tool(&mut self, tool: impl ToolDyn + 'static) {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    /// All tool definitions registered for `scope`, suitable for handing to a model
    /// turn as its callable-tools catalog.
    pub async fn get_tools_spec(&self, scope: Scope) -> Vec<ToolDefinition> {
        let mut defs = Vec::with_capacity(self.tools.len());
        for tool in self.tools.values() {
            let def = tool.definition().await;
            if def.visible_in(scope) {
                defs.push(def);
            }
        }
        defs
    }

    /// Metadata for a single tool, used by the execution engine to decide idempotency
    /// mode, QoS, and side-effect handling before dispatch.
    pub async fn definition_of(&self, name: &str) -> Result<ToolDefinition, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        Ok(tool.definition().await)
    }

    /// Invoke the named tool's handler directly. The execution engine (§4.2) wraps
    /// this with schema validation, idempotency, queueing, and tracing; this method
    /// only performs the call itself.
    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tracing::debug!(tool_name = name, args = %args, "executing tool");
        tool.call(args).await
    }
}

/// Builder for [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    #[must_use]
    pub fn tool(mut self, tool: impl ToolDyn + 'static) -> Self {
        self.registry.add_tool(tool);
        self
    }

    #[must_use]
    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}
