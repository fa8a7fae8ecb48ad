//! Settings policy: legacy key migration followed by normalization into an
//! effective [`SettingsProfile`] (§4.9).

pub mod error;
pub mod migrate;
pub mod profile;

pub use error::SettingsError;
pub use migrate::migrate_legacy_keys;
pub use profile::{normalize_user_settings, ModelTier, Overrides, Profile, ReasoningEffort, SettingsProfile, ToolDefaults};

use std::collections::HashMap;

use serde_json::Value;

/// Full pipeline: migrate legacy keys, then normalize. Pure and total (§4.9).
#[must_use]
pub fn effective_settings(raw: &HashMap<String, Value>) -> SettingsProfile {
    let mut migrated = raw.clone();
    migrate_legacy_keys(&mut migrated);
    normalize_user_settings(&migrated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_settings_normalize_the_same_as_their_migrated_equivalent() {
        let mut legacy = HashMap::new();
        legacy.insert("profile".to_string(), Value::String("fast".to_string()));
        legacy.insert("reasoningLevel".to_string(), Value::String("high".to_string()));

        let mut modern = HashMap::new();
        modern.insert("profile".to_string(), Value::String("fast".to_string()));
        modern.insert("overrides.reasoning_effort".to_string(), Value::String("high".to_string()));

        let from_legacy = effective_settings(&legacy);
        let from_modern = effective_settings(&modern);
        assert_eq!(from_legacy.reasoning_effort, from_modern.reasoning_effort);
    }
}
