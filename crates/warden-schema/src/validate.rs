//! # Value Validation
//!
//! A pure recursive walk over the schema tree. Every violation is collected
//! (validation does not stop at the first one), each tagged with the JSON
//! Pointer of the offending value.

use serde_json::Value;
use warden_core::SchemaViolation;

use crate::error::SchemaError;
use crate::openapi::json_type;
use crate::tree::{Schema, SchemaKind, UnknownFields};

impl Schema {
    /// Validate `value`, returning every violation found.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        let violations = self.violations(value);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Violations(violations))
        }
    }

    /// Collect the violations of `value` without wrapping them in an error.
    pub fn violations(&self, value: &Value) -> Vec<SchemaViolation> {
        let mut out = Vec::new();
        check(self, value, "", &mut out);
        out
    }
}

/// Append a JSON Pointer segment, escaping `~` and `/`.
pub(crate) fn child_path(parent: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{parent}/{escaped}")
}

fn check(schema: &Schema, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    if value.is_null() {
        if !schema.nullable && schema.kind != SchemaKind::Any {
            out.push(SchemaViolation::new(path, "must not be null"));
        }
        return;
    }

    if let Some(allowed) = &schema.enum_values {
        if !allowed.contains(value) {
            out.push(SchemaViolation::new(
                path,
                format!("{value} is not one of the allowed values"),
            ));
        }
    }

    match &schema.kind {
        SchemaKind::Any => {}
        SchemaKind::String => expect(value.is_string(), "string", value, path, out),
        SchemaKind::Boolean => expect(value.is_boolean(), "boolean", value, path, out),
        SchemaKind::Number => expect(value.is_number(), "number", value, path, out),
        SchemaKind::Integer => expect(is_integer(value), "integer", value, path, out),
        SchemaKind::Array(array) => {
            let Some(elements) = value.as_array() else {
                expect(false, "array", value, path, out);
                return;
            };
            if let Some(items) = &array.items {
                for (index, element) in elements.iter().enumerate() {
                    check(items, element, &child_path(path, &index.to_string()), out);
                }
            }
        }
        SchemaKind::Object(object) => {
            let Some(fields) = value.as_object() else {
                expect(false, "object", value, path, out);
                return;
            };
            for name in &object.required {
                if !fields.contains_key(name) {
                    out.push(SchemaViolation::new(
                        path,
                        format!("missing required property {name:?}"),
                    ));
                }
            }
            for (name, field) in fields {
                let field_path = child_path(path, name);
                if let Some(property) = object.properties.get(name) {
                    check(property, field, &field_path, out);
                    continue;
                }
                match &object.unknown_fields {
                    Some(UnknownFields::Preserve) => {}
                    Some(UnknownFields::Validate(values)) => check(values, field, &field_path, out),
                    Some(UnknownFields::Reject) | None => {
                        out.push(SchemaViolation::new(field_path, "unknown field"));
                    }
                }
            }
        }
    }
}

fn expect(ok: bool, expected: &str, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    if !ok {
        out.push(SchemaViolation::new(
            path,
            format!("expected {expected}, found {}", json_type(value)),
        ));
    }
}

/// Integers may arrive as floats with no fractional part (YAML `1.0`).
fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}
