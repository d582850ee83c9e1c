//! # Document Target
//!
//! Reviews arbitrary JSON objects. Constraints scope themselves by the
//! object's top-level `kind` and by exact values at JSON Pointer locations.
//!
//! ```json
//! { "kinds": ["Deployment"], "fields": { "/spec/tier": "frontend" } }
//! ```

use serde_json::Value;
use warden_core::TargetName;
use warden_schema::Schema;

use crate::handler::{string_list, DataEntry, TargetHandler};

/// A target for plain JSON documents, registered under a caller-chosen name.
#[derive(Debug, Clone)]
pub struct DocumentTarget {
    name: TargetName,
}

impl DocumentTarget {
    /// Create a document target with the given name.
    pub fn new(name: TargetName) -> Self {
        Self { name }
    }
}

impl TargetHandler for DocumentTarget {
    fn name(&self) -> &TargetName {
        &self.name
    }

    fn match_schema(&self) -> Schema {
        Schema::object([
            ("kinds", Schema::array(Schema::string())),
            ("fields", Schema::map_of(Schema::any())),
        ])
    }

    fn to_evaluator_input(&self, object: &Value) -> Option<Value> {
        object.is_object().then(|| object.clone())
    }

    fn matches(&self, match_spec: Option<&Value>, review: &Value) -> bool {
        let Some(spec) = match_spec else {
            return true;
        };

        if let Some(kinds) = string_list(spec, "kinds") {
            let kind = review.get("kind").and_then(Value::as_str);
            if !kinds.is_empty() && !kind.is_some_and(|k| kinds.contains(&k)) {
                return false;
            }
        }

        if let Some(fields) = spec.get("fields").and_then(Value::as_object) {
            for (pointer, expected) in fields {
                if review.pointer(pointer) != Some(expected) {
                    return false;
                }
            }
        }

        true
    }

    /// Documents with a string `kind` and `name` are stored at
    /// `<kind>/<name>`.
    fn process_data(&self, object: &Value) -> Option<DataEntry> {
        let kind = object.get("kind")?.as_str()?;
        let name = object.get("name")?.as_str()?;
        Some(DataEntry {
            path: vec![kind.to_string(), name.to_string()],
            value: object.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> DocumentTarget {
        DocumentTarget::new(TargetName::new("t1").unwrap())
    }

    #[test]
    fn handles_only_objects() {
        assert!(target().to_evaluator_input(&json!({"value": 1})).is_some());
        assert!(target().to_evaluator_input(&json!([1, 2])).is_none());
        assert!(target().to_evaluator_input(&json!("x")).is_none());
    }

    #[test]
    fn missing_spec_matches_everything() {
        assert!(target().matches(None, &json!({"value": 15})));
    }

    #[test]
    fn matches_by_kind() {
        let spec = json!({"kinds": ["Deployment", "Job"]});
        assert!(target().matches(Some(&spec), &json!({"kind": "Job"})));
        assert!(!target().matches(Some(&spec), &json!({"kind": "Pod"})));
        assert!(!target().matches(Some(&spec), &json!({"value": 1})));
        assert!(target().matches(Some(&json!({"kinds": []})), &json!({"value": 1})));
    }

    #[test]
    fn matches_by_field_pointer() {
        let spec = json!({"fields": {"/spec/tier": "frontend", "/replicas": 3}});
        assert!(target().matches(Some(&spec), &json!({"spec": {"tier": "frontend"}, "replicas": 3})));
        assert!(!target().matches(Some(&spec), &json!({"spec": {"tier": "backend"}, "replicas": 3})));
        assert!(!target().matches(Some(&spec), &json!({"spec": {"tier": "frontend"}})));
    }

    #[test]
    fn match_schema_accepts_its_own_spec() {
        let schema = target().match_schema().with_unknown_field_policy(false);
        assert!(schema.validate(&json!({"kinds": ["Job"], "fields": {"/a": 1}})).is_ok());
        assert!(schema.validate(&json!({"namespaces": ["x"]})).is_err());
    }

    #[test]
    fn data_path_uses_kind_and_name() {
        let entry = target().process_data(&json!({"kind": "Team", "name": "core"})).unwrap();
        assert_eq!(entry.path, vec!["Team".to_string(), "core".to_string()]);
        assert!(target().process_data(&json!({"kind": "Team"})).is_none());
    }
}
