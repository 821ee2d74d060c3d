//! Untyped record representation shared by entity stores and services.

use serde_json::Value;

/// A field-name → value map. Entities convert to and from records so that
/// generic code can read fields by name.
pub type Record = serde_json::Map<String, Value>;

/// Render a scalar the way it appears inside cache keys and lookups.
///
/// Strings are used verbatim; other values use their JSON text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a record from a JSON value, returning `None` for non-objects.
pub fn into_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
