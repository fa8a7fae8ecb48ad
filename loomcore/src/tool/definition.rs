use schemars::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The phase(s) a tool is visible in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Planning,
    Execution,
    Proofreading,
}

/// How repeated invocations of the same tool call are deduplicated (§4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyMode {
    /// Always re-execute.
    None,
    /// Dedupe on the model-issued `call_id`.
    ByCallId,
    /// Dedupe on a hash of the canonicalized arguments.
    ByArgsHash,
}

/// Idempotency configuration for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idempotency {
    pub mode: IdempotencyMode,
}

impl Idempotency {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            mode: IdempotencyMode::None,
        }
    }

    #[must_use]
    pub const fn by_call_id() -> Self {
        Self {
            mode: IdempotencyMode::ByCallId,
        }
    }

    #[must_use]
    pub const fn by_args_hash() -> Self {
        Self {
            mode: IdempotencyMode::ByArgsHash,
        }
    }
}

/// Classifies the side effects a tool handler performs, which determines whether its
/// cached output gets a lease (§4.2.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectCategory {
    None,
    DomWrite,
    StorageWrite,
    Network,
}

impl SideEffectCategory {
    #[must_use]
    pub const fn needs_lease(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Quality-of-service knobs enforced by the execution engine (§4.2.3, §4.2.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qos {
    #[serde(default = "Qos::default_queue_depth_limit")]
    pub queue_depth_limit: usize,
    #[serde(default)]
    pub debounce_ms: u64,
    #[serde(default)]
    pub coalesce_key: Option<String>,
    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,
    #[serde(default)]
    pub max_payload_bytes: Option<usize>,
}

impl Qos {
    const fn default_queue_depth_limit() -> usize {
        200
    }

    /// Clamp `queue_depth_limit` to the spec's floor of 10.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.queue_depth_limit = self.queue_depth_limit.max(10);
        self
    }

    #[must_use]
    pub fn coalesces(&self) -> bool {
        self.coalesce_key.is_some() && self.debounce_ms > 0
    }
}

impl Default for Qos {
    fn default() -> Self {
        Self {
            queue_depth_limit: Self::default_queue_depth_limit(),
            debounce_ms: 0,
            coalesce_key: None,
            cache_ttl_ms: None,
            max_payload_bytes: None,
        }
    }
}

/// Metadata describing one registered tool (§3.1 `ToolDefinition`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub scope: Vec<Scope>,
    pub parameters: Value,
    pub idempotency: Idempotency,
    pub qos: Qos,
    pub side_effects: SideEffectCategory,
    #[serde(default = "ToolDefinition::default_version")]
    pub tool_version: String,
}

impl ToolDefinition {
    fn default_version() -> String {
        "1.0.0".to_string()
    }

    /// Build a [`ToolDefinition`] from a [`Schema`] produced by `schemars`.
    #[must_use]
    pub fn from_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        scope: Vec<Scope>,
        schema: &Schema,
        idempotency: Idempotency,
        qos: Qos,
        side_effects: SideEffectCategory,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            scope,
            parameters: Value::Object(schema.as_value().as_object().cloned().unwrap_or_default()),
            idempotency,
            qos: qos.normalized(),
            side_effects,
            tool_version: Self::default_version(),
        }
    }

    #[must_use]
    pub fn visible_in(&self, scope: Scope) -> bool {
        self.scope.contains(&scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_normalization_floors_queue_depth_at_ten() {
        let qos = Qos {
            queue_depth_limit: 3,
            ..Qos::default()
        }
        .normalized();
        assert_eq!(qos.queue_depth_limit, 10);
    }

    #[test]
    fn qos_coalesces_requires_both_key_and_debounce() {
        let mut qos = Qos::default();
        assert!(!qos.coalesces());
        qos.coalesce_key = Some("k".into());
        assert!(!qos.coalesces());
        qos.debounce_ms = 50;
        assert!(qos.coalesces());
    }
}
