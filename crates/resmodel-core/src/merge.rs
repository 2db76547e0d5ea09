//! # Merge Helpers
//!
//! Value-level merging used when a request body is applied to a stored
//! resource.
//!
//! - [`merge_map_updates`]: keyed updates where each entry is either
//!   "set to value" (`Some`) or "delete" (`None`). Used for tag maps.
//! - [`merge_patch`]: RFC 7396 JSON Merge Patch (`PATCH` bodies).
//! - [`merge_overlay`]: non-null overlay (`PUT` bodies over defaults).

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Apply keyed updates onto `dst`.
///
/// `None` removes the key; `Some(v)` inserts or replaces it. Keys absent from
/// `updates` are left untouched.
pub fn merge_map_updates<V: Clone>(
    updates: &BTreeMap<String, Option<V>>,
    dst: &mut BTreeMap<String, V>,
) {
    for (key, update) in updates {
        match update {
            None => {
                dst.remove(key);
            }
            Some(value) => {
                dst.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Apply an RFC 7396 merge patch to `target` in place.
///
/// An object patch merges member by member, with `null` members deleting the
/// corresponding target member. Any other patch value replaces the target.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_members) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_members) = target {
        for (key, value) in patch_members {
            if value.is_null() {
                target_members.remove(key);
            } else {
                merge_patch(
                    target_members.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

/// Overlay `overlay` onto `base` in place, ignoring `null` members.
///
/// Objects merge recursively; any other non-null overlay value replaces the
/// base value. Unlike [`merge_patch`], `null` never deletes.
pub fn merge_overlay(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_members), Value::Object(overlay_members)) => {
            for (key, value) in overlay_members {
                if value.is_null() {
                    continue;
                }
                match base_members.get_mut(key) {
                    Some(existing) => merge_overlay(existing, value),
                    None => {
                        base_members.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, value) => *base = value.clone(),
    }
}

/// True if `value` is the zero value for its kind: `null`, `""`, `0`,
/// `false`, `[]` or `{}`.
pub fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
