//! Conversion between JSON values and SQLite values.
//!
//! Bind parameters arrive as JSON inside request envelopes; result rows go
//! back out the same way. Blob columns are base64-encoded on the way out so
//! they survive the JSON envelope.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rusqlite::types::{Value as SqlValue, ValueRef};

/// Convert a JSON bind parameter to an owned SQLite value.
///
/// Booleans become 0/1 integers; arrays and objects are bound as their JSON
/// text, matching how the schema stores structured columns.
pub fn bind_value(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Convert one SQLite column value to JSON.
pub fn column_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(BASE64.encode(b)),
    }
}
