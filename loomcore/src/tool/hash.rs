//! Canonical JSON encoding and the FNV-1a hash used to compute `argsHash` (§4.2.1).
//!
//! `argsHash` must be stable across restarts, so it cannot depend on `HashMap`
//! iteration order or `serde_json`'s default (insertion) key order — every object's
//! keys are sorted lexicographically, recursively, before hashing.

use serde_json::Value;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Recursively sort object keys so the JSON text is stable across processes.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize `value` as canonical JSON text (sorted keys at every level).
#[must_use]
pub fn canonical_json_string(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// 32-bit FNV-1a over UTF-8 bytes, rendered as 8 lowercase hex digits.
#[must_use]
pub fn fnv1a_hex(bytes: &[u8]) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:08x}")
}

/// `argsHash` for a `(toolName, args)` pair: FNV-1a of the canonical JSON of
/// `{"toolName": ..., "args": ...}`.
#[must_use]
pub fn args_hash(tool_name: &str, args: &Value) -> String {
    let envelope = serde_json::json!({ "toolName": tool_name, "args": args });
    fnv1a_hex(canonical_json_string(&envelope).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalization_is_independent_of_input_key_order() {
        let a = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let b = json!({"a": {"c": 3, "d": 2}, "b": 1});
        assert_eq!(canonical_json_string(&a), canonical_json_string(&b));
    }

    #[test]
    fn args_hash_is_stable_and_sensitive_to_content() {
        let h1 = args_hash("page.apply_delta", &json!({"key": "b1", "text": "hi"}));
        let h2 = args_hash("page.apply_delta", &json!({"text": "hi", "key": "b1"}));
        let h3 = args_hash("page.apply_delta", &json!({"key": "b1", "text": "bye"}));
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 8);
    }
}
