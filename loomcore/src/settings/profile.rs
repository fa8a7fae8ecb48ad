//! Named [`Profile`] baselines plus per-field overrides, normalized from the raw
//! untyped settings bag into an effective [`SettingsProfile`] (§4.9).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Fast,
    Balanced,
    Thorough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Economy,
    Standard,
    Premium,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToolDefaults {
    pub debounce_ms: u64,
    pub queue_depth_limit: u32,
}

/// The fields a per-profile override patch may touch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overrides {
    pub reasoning_effort: Option<ReasoningEffort>,
    pub caching: Option<bool>,
    pub routing: Option<ModelTier>,
    pub max_steps: Option<usize>,
}

/// The normalized, effective settings the rest of the crate reads from.
#[derive(Debug, Clone)]
pub struct SettingsProfile {
    pub profile: Profile,
    pub reasoning_effort: ReasoningEffort,
    pub caching: bool,
    pub routing: ModelTier,
    pub tool_defaults: ToolDefaults,
    pub max_steps: usize,
}

impl Profile {
    #[must_use]
    pub const fn baseline(self) -> SettingsProfile {
        match self {
            Self::Fast => SettingsProfile {
                profile: self,
                reasoning_effort: ReasoningEffort::Low,
                caching: true,
                routing: ModelTier::Economy,
                tool_defaults: ToolDefaults { debounce_ms: 8, queue_depth_limit: 10 },
                max_steps: 12,
            },
            Self::Balanced => SettingsProfile {
                profile: self,
                reasoning_effort: ReasoningEffort::Medium,
                caching: true,
                routing: ModelTier::Standard,
                tool_defaults: ToolDefaults { debounce_ms: 150, queue_depth_limit: 10 },
                max_steps: 20,
            },
            Self::Thorough => SettingsProfile {
                profile: self,
                reasoning_effort: ReasoningEffort::High,
                caching: false,
                routing: ModelTier::Premium,
                tool_defaults: ToolDefaults { debounce_ms: 300, queue_depth_limit: 20 },
                max_steps: 30,
            },
        }
    }
}

fn parse_profile(value: Option<&Value>) -> Profile {
    match value.and_then(Value::as_str) {
        Some("fast") => Profile::Fast,
        Some("thorough") => Profile::Thorough,
        _ => Profile::Balanced,
    }
}

fn parse_reasoning_effort(value: Option<&Value>) -> Option<ReasoningEffort> {
    match value.and_then(Value::as_str) {
        Some("low") => Some(ReasoningEffort::Low),
        Some("medium") => Some(ReasoningEffort::Medium),
        Some("high") => Some(ReasoningEffort::High),
        _ => None,
    }
}

fn parse_routing(value: Option<&Value>) -> Option<ModelTier> {
    match value.and_then(Value::as_str) {
        Some("economy") => Some(ModelTier::Economy),
        Some("standard") => Some(ModelTier::Standard),
        Some("premium") => Some(ModelTier::Premium),
        _ => None,
    }
}

/// Pure, total normalization: unknown keys are ignored, missing keys fall back to
/// the profile baseline, and malformed values fall back to the field default
/// rather than erroring.
#[must_use]
pub fn normalize_user_settings(raw: &HashMap<String, Value>) -> SettingsProfile {
    let profile = parse_profile(raw.get("profile"));
    let mut effective = profile.baseline();

    if let Some(effort) = parse_reasoning_effort(raw.get("overrides.reasoning_effort")) {
        effective.reasoning_effort = effort;
    }
    if let Some(caching) = raw.get("overrides.caching").and_then(Value::as_bool) {
        effective.caching = caching;
    }
    if let Some(routing) = parse_routing(raw.get("overrides.routing")) {
        effective.routing = routing;
    }
    if let Some(max_steps) = raw.get("overrides.max_steps").and_then(Value::as_u64) {
        effective.max_steps = max_steps as usize;
    }

    effective
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_profile_falls_back_to_balanced() {
        let mut raw = HashMap::new();
        raw.insert("profile".to_string(), Value::String("nonsense".to_string()));
        let effective = normalize_user_settings(&raw);
        assert_eq!(effective.profile, Profile::Balanced);
    }

    #[test]
    fn malformed_override_value_falls_back_to_the_baseline_field() {
        let mut raw = HashMap::new();
        raw.insert("profile".to_string(), Value::String("fast".to_string()));
        raw.insert("overrides.reasoning_effort".to_string(), Value::String("not-a-level".to_string()));
        let effective = normalize_user_settings(&raw);
        assert_eq!(effective.reasoning_effort, ReasoningEffort::Low);
    }

    #[test]
    fn normalizing_twice_is_idempotent() {
        let mut raw = HashMap::new();
        raw.insert("profile".to_string(), Value::String("thorough".to_string()));
        raw.insert("overrides.max_steps".to_string(), Value::Number(40.into()));
        let first = normalize_user_settings(&raw);
        let second = normalize_user_settings(&raw);
        assert_eq!(first.max_steps, second.max_steps);
        assert_eq!(first.max_steps, 40);
    }
}
