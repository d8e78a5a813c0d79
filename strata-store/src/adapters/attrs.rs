//! Attribute serialization for storage.
//!
//! Array containers hold attributes as flat string-keyed scalars, so richer
//! JSON values are folded to strings on write and recovered on read:
//! booleans to `"true"`/`"false"`, null to `"None"`, arrays and objects to
//! JSON text. Encoding is idempotent after the second application.

use serde_json::{Map, Value};

const NULL_SENTINEL: &str = "None";

/// Fold attribute values into their storage form.
pub fn encode_attrs(attrs: &Map<String, Value>) -> Map<String, Value> {
    attrs
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::from(NULL_SENTINEL),
        Value::Bool(flag) => Value::from(flag.to_string()),
        Value::Array(_) | Value::Object(_) => Value::from(value.to_string()),
        Value::Number(_) | Value::String(_) => value.clone(),
    }
}

/// Recover attribute values from their storage form.
pub fn decode_attrs(attrs: &Map<String, Value>) -> Map<String, Value> {
    attrs
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

fn decode_value(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    match text.as_str() {
        NULL_SENTINEL => Value::Null,
        "true" => Value::from(true),
        "false" => Value::from(false),
        other => {
            if other.starts_with('[') || other.starts_with('{') {
                serde_json::from_str(other).unwrap_or_else(|_| value.clone())
            } else {
                value.clone()
            }
        }
    }
}
