//! # OpenAPI v3 Conversion
//!
//! Parses the subset of OpenAPI v3 that structural schemas use and renders
//! a resolved tree back to it. Keywords outside that subset (`format`,
//! `default`, `pattern`, `minimum`, ...) are accepted and ignored.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::tree::{ArraySchema, ObjectSchema, Schema, SchemaKind, UnknownFields};
use crate::validate::child_path;

/// The Kubernetes extension that marks a node as accepting undeclared
/// properties.
pub const PRESERVE_UNKNOWN_FIELDS: &str = "x-kubernetes-preserve-unknown-fields";

impl Schema {
    /// Parse an OpenAPI v3 schema document.
    ///
    /// Unknown field policies are left unset; call
    /// [`Schema::with_unknown_field_policy`] to resolve them.
    pub fn parse(document: &Value) -> Result<Schema, SchemaError> {
        parse_node(document, "")
    }

    /// Render the tree as an OpenAPI v3 document.
    pub fn to_openapi(&self) -> Value {
        let mut out = Map::new();
        if self.explicit_type {
            if let Some(name) = self.kind.type_name() {
                out.insert("type".into(), Value::String(name.into()));
            }
        }
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::String(description.clone()));
        }
        if self.nullable {
            out.insert("nullable".into(), Value::Bool(true));
        }
        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), Value::Array(values.clone()));
        }
        match &self.kind {
            SchemaKind::Object(object) => {
                if !object.properties.is_empty() {
                    let properties = object
                        .properties
                        .iter()
                        .map(|(name, schema)| (name.clone(), schema.to_openapi()))
                        .collect();
                    out.insert("properties".into(), Value::Object(properties));
                }
                if !object.required.is_empty() {
                    out.insert(
                        "required".into(),
                        Value::Array(object.required.iter().cloned().map(Value::String).collect()),
                    );
                }
                match &object.unknown_fields {
                    Some(UnknownFields::Preserve) => {
                        out.insert(PRESERVE_UNKNOWN_FIELDS.into(), Value::Bool(true));
                    }
                    Some(UnknownFields::Validate(values)) => {
                        out.insert("additionalProperties".into(), values.to_openapi());
                    }
                    Some(UnknownFields::Reject) | None => {}
                }
            }
            SchemaKind::Array(array) => {
                if let Some(items) = &array.items {
                    out.insert("items".into(), items.to_openapi());
                }
            }
            SchemaKind::Any => {
                out.insert(PRESERVE_UNKNOWN_FIELDS.into(), Value::Bool(true));
            }
            SchemaKind::String | SchemaKind::Integer | SchemaKind::Number | SchemaKind::Boolean => {}
        }
        Value::Object(out)
    }
}

fn parse_node(node: &Value, path: &str) -> Result<Schema, SchemaError> {
    let map = node
        .as_object()
        .ok_or_else(|| SchemaError::malformed(path, format!("expected an object, found {}", json_type(node))))?;

    let declared = match map.get("type") {
        None => None,
        Some(Value::String(name)) => Some(name.as_str()),
        Some(other) => {
            return Err(SchemaError::malformed(
                &child_path(path, "type"),
                format!("`type` must be a string, found {}", json_type(other)),
            ))
        }
    };

    let preserve = flag(map, PRESERVE_UNKNOWN_FIELDS, path)?;
    let nullable = flag(map, "nullable", path)?;

    let description = match map.get("description") {
        None => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            return Err(SchemaError::malformed(
                &child_path(path, "description"),
                format!("`description` must be a string, found {}", json_type(other)),
            ))
        }
    };

    let enum_values = match map.get("enum") {
        None => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(other) => {
            return Err(SchemaError::malformed(
                &child_path(path, "enum"),
                format!("`enum` must be an array, found {}", json_type(other)),
            ))
        }
    };

    let kind = match declared {
        Some("object") => SchemaKind::Object(parse_object(map, path, preserve)?),
        Some("array") => SchemaKind::Array(parse_array(map, path)?),
        Some("string") => SchemaKind::String,
        Some("integer") => SchemaKind::Integer,
        Some("number") => SchemaKind::Number,
        Some("boolean") => SchemaKind::Boolean,
        Some(other) => {
            return Err(SchemaError::malformed(
                &child_path(path, "type"),
                format!("unknown type {other:?}"),
            ))
        }
        None if map.contains_key("properties") || map.contains_key("additionalProperties") => {
            SchemaKind::Object(parse_object(map, path, preserve)?)
        }
        None if map.contains_key("items") => SchemaKind::Array(parse_array(map, path)?),
        None => SchemaKind::Any,
    };

    Ok(Schema {
        kind,
        nullable,
        enum_values,
        description,
        explicit_type: declared.is_some(),
    })
}

fn parse_object(map: &Map<String, Value>, path: &str, preserve: bool) -> Result<ObjectSchema, SchemaError> {
    let mut object = ObjectSchema::default();

    match map.get("properties") {
        None => {}
        Some(Value::Object(properties)) => {
            let properties_path = child_path(path, "properties");
            for (name, node) in properties {
                let schema = parse_node(node, &child_path(&properties_path, name))?;
                object.properties.insert(name.clone(), schema);
            }
        }
        Some(other) => {
            return Err(SchemaError::malformed(
                &child_path(path, "properties"),
                format!("`properties` must be an object, found {}", json_type(other)),
            ))
        }
    }

    match map.get("required") {
        None => {}
        Some(Value::Array(names)) => {
            for (index, name) in names.iter().enumerate() {
                match name {
                    Value::String(name) => object.required.push(name.clone()),
                    other => {
                        return Err(SchemaError::malformed(
                            &child_path(&child_path(path, "required"), &index.to_string()),
                            format!("required property names must be strings, found {}", json_type(other)),
                        ))
                    }
                }
            }
        }
        Some(other) => {
            return Err(SchemaError::malformed(
                &child_path(path, "required"),
                format!("`required` must be an array, found {}", json_type(other)),
            ))
        }
    }

    object.unknown_fields = if preserve {
        Some(UnknownFields::Preserve)
    } else {
        match map.get("additionalProperties") {
            None => None,
            Some(Value::Bool(true)) => Some(UnknownFields::Preserve),
            Some(Value::Bool(false)) => Some(UnknownFields::Reject),
            Some(node @ Value::Object(_)) => Some(UnknownFields::Validate(Box::new(parse_node(
                node,
                &child_path(path, "additionalProperties"),
            )?))),
            Some(other) => {
                return Err(SchemaError::malformed(
                    &child_path(path, "additionalProperties"),
                    format!(
                        "`additionalProperties` must be a boolean or a schema, found {}",
                        json_type(other)
                    ),
                ))
            }
        }
    };

    Ok(object)
}

fn parse_array(map: &Map<String, Value>, path: &str) -> Result<ArraySchema, SchemaError> {
    let items_path = child_path(path, "items");
    let items = match map.get("items") {
        None => None,
        Some(node @ Value::Object(_)) => Some(Box::new(parse_node(node, &items_path)?)),
        Some(Value::Array(_)) => {
            return Err(SchemaError::malformed(&items_path, "tuple-form `items` is not supported"))
        }
        Some(other) => {
            return Err(SchemaError::malformed(
                &items_path,
                format!("`items` must be a schema, found {}", json_type(other)),
            ))
        }
    };
    Ok(ArraySchema { items })
}

fn flag(map: &Map<String, Value>, key: &str, path: &str) -> Result<bool, SchemaError> {
    match map.get(key) {
        None => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(other) => Err(SchemaError::malformed(
            &child_path(path, key),
            format!("`{key}` must be a boolean, found {}", json_type(other)),
        )),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Parameter schema nested two levels deep through an array.
    fn two_deep() -> Value {
        json!({
            "properties": {
                "message": {"type": "string"},
                "labels": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "key": {"type": "string"},
                            "allowedRegex": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn legacy_rendering_marks_every_object_node() {
        let rendered = Schema::parse(&two_deep())
            .unwrap()
            .with_unknown_field_policy(true)
            .to_openapi();
        assert_eq!(
            rendered,
            json!({
                "x-kubernetes-preserve-unknown-fields": true,
                "properties": {
                    "message": {"type": "string"},
                    "labels": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "x-kubernetes-preserve-unknown-fields": true,
                            "properties": {
                                "key": {"type": "string"},
                                "allowedRegex": {"type": "string"}
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn strict_rendering_adds_nothing() {
        let rendered = Schema::parse(&two_deep())
            .unwrap()
            .with_unknown_field_policy(false)
            .to_openapi();
        assert_eq!(rendered, two_deep());
    }

    #[test]
    fn untyped_node_with_items_is_an_array() {
        let schema = Schema::parse(&json!({"items": {"type": "string"}})).unwrap();
        assert!(matches!(schema.kind, SchemaKind::Array(_)));
        assert!(!schema.explicit_type);
    }

    #[test]
    fn empty_schema_is_any() {
        assert_eq!(Schema::parse(&json!({})).unwrap().kind, SchemaKind::Any);
    }

    #[test]
    fn additional_properties_forms() {
        let validate = Schema::parse(&json!({"type": "object", "additionalProperties": {"type": "string"}})).unwrap();
        assert_eq!(
            validate.as_object().unwrap().unknown_fields,
            Some(UnknownFields::Validate(Box::new(Schema::string())))
        );

        let open = Schema::parse(&json!({"type": "object", "additionalProperties": true})).unwrap();
        assert_eq!(open.as_object().unwrap().unknown_fields, Some(UnknownFields::Preserve));

        let closed = Schema::parse(&json!({"type": "object", "additionalProperties": false})).unwrap();
        assert_eq!(closed.as_object().unwrap().unknown_fields, Some(UnknownFields::Reject));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = Schema::parse(&json!({"properties": {"x": {"type": "strin"}}})).unwrap_err();
        match err {
            SchemaError::Malformed { path, reason } => {
                assert_eq!(path, "/properties/x/type");
                assert!(reason.contains("strin"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_keywords() {
        let cases = [
            json!("string"),
            json!({"type": 3}),
            json!({"type": "object", "properties": []}),
            json!({"type": "object", "required": "a"}),
            json!({"type": "object", "required": [1]}),
            json!({"type": "array", "items": [{"type": "string"}]}),
            json!({"type": "string", "nullable": "yes"}),
            json!({"type": "string", "enum": "a"}),
            json!({"type": "object", "additionalProperties": 1}),
        ];
        for case in cases {
            assert!(
                matches!(Schema::parse(&case), Err(SchemaError::Malformed { .. })),
                "accepted malformed schema {case}"
            );
        }
    }

    #[test]
    fn ignores_annotation_keywords() {
        let schema = Schema::parse(&json!({"type": "integer", "format": "int32", "minimum": 0, "default": 3})).unwrap();
        assert_eq!(schema.kind, SchemaKind::Integer);
    }

    #[test]
    fn parses_yaml_documents() {
        let yaml = r#"
type: object
properties:
  threshold:
    type: integer
  mode:
    type: string
    enum: [audit, enforce]
required: [threshold]
"#;
        let document: Value = serde_yaml::from_str(yaml).unwrap();
        let schema = Schema::parse(&document).unwrap();
        let object = schema.as_object().unwrap();
        assert_eq!(object.required, vec!["threshold".to_string()]);
        assert_eq!(
            schema.property("mode").unwrap().enum_values,
            Some(vec![json!("audit"), json!("enforce")])
        );
    }
}
