// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Context merge semantics for the free-form instance context bag (§3, §4.3).

use serde_json::{Map, Value};
use stepwise_ai::ContextUpdate;

/// Overlay `updates` onto `base`, later entries winning on key conflict.
/// Non-object `base` values are treated as an empty map, matching the data
/// model's "mapping from string keys to arbitrary JSON values" contract.
pub fn merge_context(base: &Value, updates: &Value) -> Value {
    let mut merged = as_object(base);
    let updates = as_object(updates);
    for (key, value) in updates {
        merged.insert(key, value);
    }
    Value::Object(merged)
}

/// Apply an `AIDecision.updated_context` list (AI updates override) onto a
/// context map.
pub fn apply_context_updates(base: &Value, updates: &[ContextUpdate]) -> Value {
    let mut merged = as_object(base);
    for update in updates {
        merged.insert(update.key.clone(), update.value.clone());
    }
    Value::Object(merged)
}

fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_updates_override_existing_keys() {
        let base = json!({"a": 1, "b": 2});
        let updates = json!({"b": 99, "c": 3});
        let merged = merge_context(&base, &updates);
        assert_eq!(merged, json!({"a": 1, "b": 99, "c": 3}));
    }

    #[test]
    fn ai_updates_override_client_updates() {
        let base = json!({"a": 1});
        let ai_updates = vec![ContextUpdate { key: "a".to_string(), value: json!(42) }];
        let merged = apply_context_updates(&base, &ai_updates);
        assert_eq!(merged, json!({"a": 42}));
    }

    #[test]
    fn empty_updates_leave_base_unchanged() {
        let base = json!({"a": 1});
        let merged = merge_context(&base, &json!({}));
        assert_eq!(merged, base);
    }
}
