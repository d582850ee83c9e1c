//! # Admission Target
//!
//! Reviews Kubernetes-style admission requests:
//!
//! ```json
//! {
//!   "kind": {"group": "apps", "version": "v1", "kind": "Deployment"},
//!   "name": "web", "namespace": "prod", "operation": "CREATE",
//!   "object": { ... }, "oldObject": null, "userInfo": { ... }
//! }
//! ```
//!
//! Bare Kubernetes objects (`apiVersion`, `kind`, `metadata`) are wrapped
//! into a request with an empty operation, so existing resources can be
//! audited with the same constraints.
//!
//! ## Match spec
//!
//! | Field | Semantics |
//! |-------|-----------|
//! | `kinds` | `[{apiGroups, kinds}]`, `*` wildcard; any entry may match |
//! | `namespaces` | object namespace is one of these (trailing-`*` globs) |
//! | `excludedNamespaces` | object namespace is none of these |
//! | `labelSelector` | `matchLabels` plus `matchExpressions` |
//! | `scope` | `*`, `Cluster` or `Namespaced` |
//! | `name` | object name (trailing-`*` glob) |
//!
//! Namespace criteria do not apply to cluster-scoped objects, except
//! `Namespace` objects themselves, whose own name is their namespace.

use serde_json::{json, Map, Value};
use warden_core::TargetName;
use warden_schema::Schema;

use crate::handler::{string_list, DataEntry, TargetHandler};
use crate::prefix_glob;

/// Name under which the admission target registers.
pub const ADMISSION_TARGET: &str = "admission.k8s.warden.dev";

/// The built-in Kubernetes admission target.
#[derive(Debug, Clone)]
pub struct AdmissionTarget {
    name: TargetName,
}

impl AdmissionTarget {
    /// Create the admission target.
    pub fn new() -> Self {
        Self {
            name: TargetName::from_static(ADMISSION_TARGET),
        }
    }
}

impl Default for AdmissionTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetHandler for AdmissionTarget {
    fn name(&self) -> &TargetName {
        &self.name
    }

    fn match_schema(&self) -> Schema {
        let strings = || Schema::array(Schema::string());
        Schema::object([
            (
                "kinds",
                Schema::array(Schema::object([("apiGroups", strings()), ("kinds", strings())])),
            ),
            ("namespaces", strings()),
            ("excludedNamespaces", strings()),
            (
                "labelSelector",
                Schema::object([
                    ("matchLabels", Schema::map_of(Schema::string())),
                    (
                        "matchExpressions",
                        Schema::array(
                            Schema::object([
                                ("key", Schema::string()),
                                (
                                    "operator",
                                    Schema::string().with_enum(vec![
                                        json!("In"),
                                        json!("NotIn"),
                                        json!("Exists"),
                                        json!("DoesNotExist"),
                                    ]),
                                ),
                                ("values", strings()),
                            ])
                            .with_required(["key", "operator"]),
                        ),
                    ),
                ]),
            ),
            (
                "scope",
                Schema::string().with_enum(vec![json!("*"), json!("Cluster"), json!("Namespaced")]),
            ),
            ("name", Schema::string()),
        ])
    }

    fn to_evaluator_input(&self, object: &Value) -> Option<Value> {
        if is_admission_request(object) {
            return Some(object.clone());
        }
        wrap_object(object)
    }

    fn matches(&self, match_spec: Option<&Value>, review: &Value) -> bool {
        let Some(spec) = match_spec else {
            return true;
        };
        let request = Request::from_review(review);

        kinds_match(spec, &request)
            && scope_matches(spec, &request)
            && namespaces_match(spec, &request)
            && name_matches(spec, &request)
            && labels_match(spec, &request)
    }

    fn process_data(&self, object: &Value) -> Option<DataEntry> {
        let api_version = object.get("apiVersion")?.as_str()?;
        let kind = object.get("kind")?.as_str()?;
        let metadata = object.get("metadata")?;
        let name = metadata.get("name")?.as_str()?;
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty());

        let mut path = Vec::with_capacity(5);
        match namespace {
            Some(ns) => {
                path.push("namespace".to_string());
                path.push(ns.to_string());
            }
            None => path.push("cluster".to_string()),
        }
        path.push(api_version.to_string());
        path.push(kind.to_string());
        path.push(name.to_string());

        Some(DataEntry {
            path,
            value: object.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Request shape
// ---------------------------------------------------------------------------

fn is_admission_request(object: &Value) -> bool {
    object
        .get("kind")
        .and_then(|k| k.get("kind"))
        .is_some_and(Value::is_string)
}

/// Wrap a bare Kubernetes object in an admission request.
fn wrap_object(object: &Value) -> Option<Value> {
    let api_version = object.get("apiVersion")?.as_str()?;
    let kind = object.get("kind")?.as_str()?;
    let metadata = object.get("metadata")?.as_object()?;

    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };

    let mut request = Map::new();
    request.insert("kind".into(), json!({"group": group, "version": version, "kind": kind}));
    request.insert("operation".into(), Value::String(String::new()));
    if let Some(name) = metadata.get("name") {
        request.insert("name".into(), name.clone());
    }
    if let Some(namespace) = metadata.get("namespace") {
        request.insert("namespace".into(), namespace.clone());
    }
    request.insert("object".into(), object.clone());
    Some(Value::Object(request))
}

/// The fields of a request that matching looks at.
struct Request<'a> {
    group: &'a str,
    kind: &'a str,
    name: &'a str,
    namespace: &'a str,
    object: Option<&'a Value>,
}

impl<'a> Request<'a> {
    fn from_review(review: &'a Value) -> Self {
        let gvk = review.get("kind");
        let field = |v: Option<&'a Value>, key: &str| -> &'a str {
            v.and_then(|v| v.get(key)).and_then(Value::as_str).unwrap_or_default()
        };
        // DELETE requests carry the object in oldObject.
        let object = review
            .get("object")
            .filter(|o| !o.is_null())
            .or_else(|| review.get("oldObject").filter(|o| !o.is_null()));
        let metadata = object.and_then(|o| o.get("metadata"));

        let name = match field(Some(review), "name") {
            "" => field(metadata, "name"),
            name => name,
        };
        let namespace = match field(Some(review), "namespace") {
            "" => field(metadata, "namespace"),
            ns => ns,
        };

        Self {
            group: field(gvk, "group"),
            kind: field(gvk, "kind"),
            name,
            namespace,
            object,
        }
    }

    fn is_namespace_object(&self) -> bool {
        self.group.is_empty() && self.kind == "Namespace"
    }

    /// The namespace used for namespace criteria, `None` for cluster-scoped
    /// objects.
    fn effective_namespace(&self) -> Option<&'a str> {
        if self.is_namespace_object() {
            Some(self.name)
        } else if self.namespace.is_empty() {
            None
        } else {
            Some(self.namespace)
        }
    }

    fn label(&self, key: &str) -> Option<&'a str> {
        self.object
            .and_then(|o| o.pointer("/metadata/labels"))
            .and_then(|labels| labels.get(key))
            .and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

fn kinds_match(spec: &Value, request: &Request<'_>) -> bool {
    let Some(entries) = spec.get("kinds").and_then(Value::as_array) else {
        return true;
    };
    if entries.is_empty() {
        return true;
    }
    entries.iter().any(|entry| {
        let groups = string_list(entry, "apiGroups").unwrap_or_default();
        let kinds = string_list(entry, "kinds").unwrap_or_default();
        let group_ok = groups.iter().any(|g| *g == "*" || *g == request.group);
        let kind_ok = kinds.iter().any(|k| *k == "*" || *k == request.kind);
        group_ok && kind_ok
    })
}

fn scope_matches(spec: &Value, request: &Request<'_>) -> bool {
    match spec.get("scope").and_then(Value::as_str) {
        Some("Cluster") => request.namespace.is_empty(),
        Some("Namespaced") => !request.namespace.is_empty(),
        _ => true,
    }
}

fn namespaces_match(spec: &Value, request: &Request<'_>) -> bool {
    let Some(namespace) = request.effective_namespace() else {
        return true;
    };
    if let Some(included) = string_list(spec, "namespaces") {
        if !included.is_empty() && !included.iter().any(|p| prefix_glob(p, namespace)) {
            return false;
        }
    }
    if let Some(excluded) = string_list(spec, "excludedNamespaces") {
        if excluded.iter().any(|p| prefix_glob(p, namespace)) {
            return false;
        }
    }
    true
}

fn name_matches(spec: &Value, request: &Request<'_>) -> bool {
    match spec.get("name").and_then(Value::as_str) {
        Some(pattern) => prefix_glob(pattern, request.name),
        None => true,
    }
}

fn labels_match(spec: &Value, request: &Request<'_>) -> bool {
    let Some(selector) = spec.get("labelSelector") else {
        return true;
    };

    if let Some(expected) = selector.get("matchLabels").and_then(Value::as_object) {
        for (key, value) in expected {
            if request.label(key) != value.as_str() {
                return false;
            }
        }
    }

    let expressions = selector
        .get("matchExpressions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    expressions.iter().all(|expr| {
        let key = expr.get("key").and_then(Value::as_str).unwrap_or_default();
        let values = string_list(expr, "values").unwrap_or_default();
        let actual = request.label(key);
        match expr.get("operator").and_then(Value::as_str) {
            Some("In") => actual.is_some_and(|v| values.contains(&v)),
            Some("NotIn") => !actual.is_some_and(|v| values.contains(&v)),
            Some("Exists") => actual.is_some(),
            Some("DoesNotExist") => actual.is_none(),
            _ => false,
        }
    })
}
