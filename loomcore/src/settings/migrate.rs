//! Legacy key migration: a fixed table of renamed/merged keys, run once before
//! normalization. Idempotent — migrating already-migrated settings is a no-op (§4.9).

use std::collections::HashMap;

use serde_json::Value;

/// `(legacy_key, new_key)` pairs. A legacy value is only copied across when the new
/// key is absent, which is what makes re-running this a no-op.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("reasoningLevel", "overrides.reasoning_effort"),
    ("enableCache", "overrides.caching"),
    ("modelRouting", "overrides.routing"),
    ("maxSteps", "overrides.max_steps"),
];

pub fn migrate_legacy_keys(raw: &mut HashMap<String, Value>) {
    for (legacy, new) in LEGACY_KEYS {
        if raw.contains_key(*new) {
            continue;
        }
        if let Some(value) = raw.remove(*legacy) {
            raw.insert((*new).to_string(), value);
        }
    }
}
