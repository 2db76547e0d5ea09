//! Helpers for walking decoded JSON values alongside their shapes.

use serde_json::Value;

use resmodel_core::ScalarKind;

pub(crate) static NULL: Value = Value::Null;

/// Member `name` of an object, or `null` when absent or not an object.
pub(crate) fn member<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.get(name).unwrap_or(&NULL)
}

/// Append a sequence subscript: `taints` → `taints[0]`.
pub(crate) fn index_subscript(target: &str, index: usize) -> String {
    format!("{target}[{index}]")
}

/// Append a map subscript: `tags` → `tags["team"]`.
pub(crate) fn key_subscript(target: &str, key: &str) -> String {
    format!("{target}[{key:?}]")
}

/// The zero value a non-optional scalar takes when absent from a body.
pub(crate) fn scalar_zero(kind: ScalarKind) -> Value {
    match kind {
        ScalarKind::String | ScalarKind::Timestamp => Value::String(String::new()),
        ScalarKind::Bool => Value::Bool(false),
        ScalarKind::Integer | ScalarKind::Unsigned | ScalarKind::Float => Value::from(0),
    }
}

/// Render a value the way error messages quote it: strings bare, other
/// values as JSON, `null` as empty.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
