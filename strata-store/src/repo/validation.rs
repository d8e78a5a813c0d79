//! Shared helpers for rendering JSON-Schema validation failures.

use serde_json::Value;

/// Flatten a validation error stream into one diagnostic line per error:
/// instance path, message and schema path.
pub(crate) fn describe_errors<'a>(
    errors: impl Iterator<Item = jsonschema::ValidationError<'a>>,
) -> String {
    let parts: Vec<String> = errors
        .map(|error| {
            let instance_path = error.instance_path.to_string();
            let schema_path = error.schema_path.to_string();
            if instance_path.is_empty() {
                format!("{error} (schema path '{schema_path}')")
            } else {
                format!("{instance_path}: {error} (schema path '{schema_path}')")
            }
        })
        .collect();
    parts.join("; ")
}

/// `describe_errors` plus the full schema, for top-level failures.
pub(crate) fn describe_errors_with_schema<'a>(
    errors: impl Iterator<Item = jsonschema::ValidationError<'a>>,
    schema: &Value,
) -> String {
    format!("{}; schema: {}", describe_errors(errors), schema)
}
