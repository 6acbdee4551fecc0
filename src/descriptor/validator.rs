//! Recursive structural validation of descriptor documents.
//!
//! Walks a parsed JSON-like tree against a constraint schema, depth-first,
//! in schema declaration order and ascending array index order. The first
//! violation encountered in that fixed traversal order is returned; no
//! aggregation across violations.

use super::constraints::{Constraint, ItemSchema, Schema};
use crate::error::ValidationError;
use serde_json::Value;

/// Validate `node` against `schema`, rooted at `path` (`$` for documents).
///
/// Returns on the first violation with its message and JSON path.
pub fn validate_object(node: &Value, schema: &Schema, path: &str) -> Result<(), ValidationError> {
    for (field, constraint) in schema {
        let field_path = format!("{path}.{field}");
        let value = node.get(*field);

        // null counts as absent: a required null is a "required" violation
        // even when null would satisfy no other check
        let present = matches!(value, Some(v) if !v.is_null());

        if !present {
            if is_required(constraint) {
                return Err(ValidationError::new(
                    format!("Field \"{field}\" is required"),
                    field_path,
                ));
            }
            continue;
        }

        let value = value.unwrap_or(&Value::Null);
        validate_field(field, value, constraint, &field_path)?;
    }
    Ok(())
}

fn is_required(constraint: &Constraint) -> bool {
    match constraint {
        Constraint::Str { required, .. }
        | Constraint::Number { required }
        | Constraint::Boolean { required }
        | Constraint::Object { required, .. }
        | Constraint::Array { required, .. }
        | Constraint::Map { required } => *required,
    }
}

fn validate_field(
    field: &str,
    value: &Value,
    constraint: &Constraint,
    path: &str,
) -> Result<(), ValidationError> {
    match constraint {
        Constraint::Str {
            pattern,
            allowed_values,
            ..
        } => {
            let Some(text) = value.as_str() else {
                return Err(type_error(field, "string", path));
            };
            if let Some(allowed) = allowed_values
                && !allowed.contains(&text)
            {
                return Err(ValidationError::new(
                    format!(
                        "Field \"{field}\" is not valid. Allowed values are: {}",
                        allowed.join(", ")
                    ),
                    path,
                ));
            }
            if let Some(pattern) = pattern
                && !pattern.regex.is_match(text)
            {
                return Err(ValidationError::new(
                    format!("Field \"{field}\" is not valid. {}", pattern.message),
                    path,
                ));
            }
            Ok(())
        }
        Constraint::Number { .. } => {
            if !value.is_number() {
                return Err(type_error(field, "number", path));
            }
            Ok(())
        }
        Constraint::Boolean { .. } => {
            if !value.is_boolean() {
                return Err(type_error(field, "boolean", path));
            }
            Ok(())
        }
        Constraint::Object { properties, .. } => {
            if !value.is_object() {
                return Err(type_error(field, "object", path));
            }
            validate_object(value, properties, path)
        }
        Constraint::Array { items, .. } => {
            // an object where an array is required gets a dedicated message
            let Some(elements) = value.as_array() else {
                return Err(ValidationError::new(
                    format!("Field \"{field}\" should be an array"),
                    path,
                ));
            };
            for (index, element) in elements.iter().enumerate() {
                validate_element(field, element, items, &format!("{path}[{index}]"))?;
            }
            Ok(())
        }
        Constraint::Map { .. } => {
            let Some(entries) = value.as_object() else {
                return Err(map_error(field, path));
            };
            for (key, entry) in entries {
                if !entry.is_string() {
                    return Err(map_error(field, &format!("{path}.{key}")));
                }
            }
            Ok(())
        }
    }
}

fn validate_element(
    field: &str,
    element: &Value,
    items: &ItemSchema,
    path: &str,
) -> Result<(), ValidationError> {
    if !element.is_object() {
        return Err(ValidationError::new(
            format!("Field \"{field}\" is not valid. Should be an array of objects"),
            path,
        ));
    }

    match items {
        ItemSchema::Object(schema) => validate_object(element, schema, path),
        ItemSchema::Union {
            discriminator,
            variants,
        } => {
            let discriminator_path = format!("{path}.{discriminator}");
            let tag = match element.get(*discriminator) {
                Some(Value::String(tag)) => tag,
                Some(value) if !value.is_null() => {
                    return Err(type_error(discriminator, "string", &discriminator_path));
                }
                _ => {
                    return Err(ValidationError::new(
                        format!("Field \"{discriminator}\" is required"),
                        discriminator_path,
                    ));
                }
            };

            // the discriminator is checked before any variant-specific field
            let Some((_, variant)) = variants.iter().find(|(value, _)| value == tag) else {
                let allowed = variants
                    .iter()
                    .map(|(value, _)| *value)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ValidationError::new(
                    format!("Field \"{discriminator}\" is not valid. Allowed values are: {allowed}"),
                    discriminator_path,
                ));
            };

            validate_object(element, variant, path)
        }
    }
}

fn type_error(field: &str, expected: &str, path: &str) -> ValidationError {
    ValidationError::new(
        format!("Field \"{field}\" is not valid. Should be a {expected}"),
        path,
    )
}

fn map_error(field: &str, path: &str) -> ValidationError {
    ValidationError::new(
        format!("Field \"{field}\" is not valid. Should be a key-value map of strings"),
        path,
    )
}
