//! # Schema Tree
//!
//! A closed set of node kinds. Every node carries the keywords common to all
//! kinds (`nullable`, `enum`, `description`); object and array nodes carry
//! their children.

use std::collections::BTreeMap;

use serde_json::Value;

/// What an object node does with properties it does not declare.
#[derive(Debug, Clone, PartialEq)]
pub enum UnknownFields {
    /// Undeclared properties are validation errors.
    Reject,
    /// Undeclared properties are accepted without inspection.
    Preserve,
    /// Undeclared properties are accepted if they satisfy the schema
    /// (`additionalProperties: {...}`).
    Validate(Box<Schema>),
}

/// Children of an object node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    /// Declared properties.
    pub properties: BTreeMap<String, Schema>,
    /// Properties that must be present.
    pub required: Vec<String>,
    /// Policy for undeclared properties. `None` until resolved by
    /// [`Schema::with_unknown_field_policy`]; unresolved nodes reject.
    pub unknown_fields: Option<UnknownFields>,
}

/// Children of an array node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArraySchema {
    /// Schema of every element. `None` accepts any element.
    pub items: Option<Box<Schema>>,
}

/// The node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// `type: object`, or an untyped node with `properties`.
    Object(ObjectSchema),
    /// `type: array`, or an untyped node with `items`.
    Array(ArraySchema),
    /// `type: string`.
    String,
    /// `type: integer`.
    Integer,
    /// `type: number`.
    Number,
    /// `type: boolean`.
    Boolean,
    /// No type constraint at all.
    Any,
}

impl SchemaKind {
    /// The OpenAPI `type` keyword for this kind.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::Object(_) => Some("object"),
            Self::Array(_) => Some("array"),
            Self::String => Some("string"),
            Self::Integer => Some("integer"),
            Self::Number => Some("number"),
            Self::Boolean => Some("boolean"),
            Self::Any => None,
        }
    }
}

/// A structural schema node.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Node kind and children.
    pub kind: SchemaKind,
    /// Whether `null` is accepted.
    pub nullable: bool,
    /// Allowed values, if restricted.
    pub enum_values: Option<Vec<Value>>,
    /// Free-form description, carried through rendering.
    pub description: Option<String>,
    /// Whether the source document spelled out `type`. Untyped object and
    /// array nodes render without it.
    pub explicit_type: bool,
}

impl Schema {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            enum_values: None,
            description: None,
            explicit_type: true,
        }
    }

    /// A node that accepts anything.
    pub fn any() -> Self {
        Self {
            explicit_type: false,
            ..Self::of(SchemaKind::Any)
        }
    }

    /// `type: string`.
    pub fn string() -> Self {
        Self::of(SchemaKind::String)
    }

    /// `type: integer`.
    pub fn integer() -> Self {
        Self::of(SchemaKind::Integer)
    }

    /// `type: number`.
    pub fn number() -> Self {
        Self::of(SchemaKind::Number)
    }

    /// `type: boolean`.
    pub fn boolean() -> Self {
        Self::of(SchemaKind::Boolean)
    }

    /// `type: array` with the given element schema.
    pub fn array(items: Schema) -> Self {
        Self::of(SchemaKind::Array(ArraySchema {
            items: Some(Box::new(items)),
        }))
    }

    /// `type: object` with the given properties and no unknown-field policy.
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Self::of(SchemaKind::Object(ObjectSchema {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            required: Vec::new(),
            unknown_fields: None,
        }))
    }

    /// An object whose values all satisfy `values` (a string map, for
    /// instance).
    pub fn map_of(values: Schema) -> Self {
        Self::object(Vec::<(String, Schema)>::new())
            .with_unknown_fields(UnknownFields::Validate(Box::new(values)))
    }

    /// Mark properties as required. No effect on non-object nodes.
    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let SchemaKind::Object(object) = &mut self.kind {
            object.required.extend(names.into_iter().map(Into::into));
        }
        self
    }

    /// Set the unknown-field policy. No effect on non-object nodes.
    pub fn with_unknown_fields(mut self, policy: UnknownFields) -> Self {
        if let SchemaKind::Object(object) = &mut self.kind {
            object.unknown_fields = Some(policy);
        }
        self
    }

    /// Restrict the node to a fixed set of values.
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Accept `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Resolve every unset unknown-field policy in the tree.
    ///
    /// Under the legacy policy unset object nodes preserve undeclared
    /// properties; otherwise they reject them. Nodes with an explicit policy
    /// keep it. String, number, boolean and array nodes are unaffected.
    pub fn with_unknown_field_policy(mut self, legacy: bool) -> Self {
        self.resolve_unknown_fields(legacy);
        self
    }

    fn resolve_unknown_fields(&mut self, legacy: bool) {
        match &mut self.kind {
            SchemaKind::Object(object) => {
                if object.unknown_fields.is_none() {
                    object.unknown_fields = Some(if legacy {
                        UnknownFields::Preserve
                    } else {
                        UnknownFields::Reject
                    });
                }
                if let Some(UnknownFields::Validate(inner)) = &mut object.unknown_fields {
                    inner.resolve_unknown_fields(legacy);
                }
                for property in object.properties.values_mut() {
                    property.resolve_unknown_fields(legacy);
                }
            }
            SchemaKind::Array(array) => {
                if let Some(items) = &mut array.items {
                    items.resolve_unknown_fields(legacy);
                }
            }
            _ => {}
        }
    }

    /// Access the object children, if this is an object node.
    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match &self.kind {
            SchemaKind::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Look up a declared property of an object node.
    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.as_object().and_then(|o| o.properties.get(name))
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unknown_fields(schema: &Schema) -> Option<&UnknownFields> {
        schema.as_object().and_then(|o| o.unknown_fields.as_ref())
    }

    #[test]
    fn legacy_preserves_every_unset_object() {
        let schema = Schema::object([
            ("message", Schema::string()),
            ("labels", Schema::array(Schema::object([("key", Schema::string())]))),
        ])
        .with_unknown_field_policy(true);

        assert_eq!(unknown_fields(&schema), Some(&UnknownFields::Preserve));
        let labels = schema.property("labels").unwrap();
        let SchemaKind::Array(array) = &labels.kind else {
            panic!("labels should be an array");
        };
        let item = array.items.as_deref().unwrap();
        assert_eq!(unknown_fields(item), Some(&UnknownFields::Preserve));
        assert_eq!(schema.property("message").unwrap().kind, SchemaKind::String);
    }

    #[test]
    fn strict_rejects_unset_objects_but_keeps_explicit_policy() {
        let schema = Schema::object([
            ("open", Schema::object(Vec::<(String, Schema)>::new()).with_unknown_fields(UnknownFields::Preserve)),
            ("closed", Schema::object([("a", Schema::integer())])),
        ])
        .with_unknown_field_policy(false);

        assert_eq!(unknown_fields(&schema), Some(&UnknownFields::Reject));
        assert_eq!(
            unknown_fields(schema.property("open").unwrap()),
            Some(&UnknownFields::Preserve)
        );
        assert_eq!(
            unknown_fields(schema.property("closed").unwrap()),
            Some(&UnknownFields::Reject)
        );
    }

    #[test]
    fn map_of_resolves_inner_schema() {
        let schema = Schema::map_of(Schema::object([("x", Schema::string())]))
            .with_unknown_field_policy(false);
        let Some(UnknownFields::Validate(inner)) = unknown_fields(&schema) else {
            panic!("expected a value schema");
        };
        assert_eq!(unknown_fields(inner), Some(&UnknownFields::Reject));
    }

    #[test]
    fn builders_ignore_non_objects() {
        let schema = Schema::string().with_required(["a"]).with_unknown_fields(UnknownFields::Reject);
        assert_eq!(schema, Schema::string());
    }
}
