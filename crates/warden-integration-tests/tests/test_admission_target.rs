//! # Admission Target End-to-End
//!
//! Templates and constraints loaded from YAML, reviewed against Kubernetes
//! admission requests and bare objects:
//! - Match criteria (kinds, namespaces, excluded namespaces)
//! - Inventory data visible to rules under `data.inventory`
//! - Derived constraint schema rejects malformed match specs
//! - Match specs scope only the targets whose schema accepts them

use serde_json::{json, Value};
use warden_client::{Client, ClientConfig};
use warden_core::{Constraint, Template, WardenError};
use warden_core::TargetName;
use warden_target::{AdmissionTarget, DocumentTarget, TargetRegistry, ADMISSION_TARGET};

const REQUIRED_LABELS: &str = r#"
kind: K8sRequiredLabels
shortNames: [requiredlabels]
validation:
  openAPIV3Schema:
    type: object
    properties:
      labels:
        type: array
        items:
          type: string
targets:
  admission.k8s.warden.dev:
    rego: |
      package k8srequiredlabels
      import rego.v1

      violation contains {"msg": msg, "details": {"missing": label}} if {
          some label in input.parameters.labels
          not input.review.object.metadata.labels[label]
          msg := concat(" ", ["missing required label", label])
      }
"#;

const TEAM_LABEL: &str = r#"
kind: K8sRequiredLabels
name: require-team
parameters:
  labels: [team]
match:
  kinds:
    - apiGroups: [""]
      kinds: [Pod]
  namespaces: ["prod-*"]
  excludedNamespaces: [prod-sandbox]
"#;

const UNIQUE_SERVICE: &str = r#"
kind: UniqueServiceName
targets:
  admission.k8s.warden.dev:
    rego: |
      package uniqueservicename
      import rego.v1

      violation contains {"msg": msg} if {
          input.review.kind.kind == "Service"
          name := input.review.object.metadata.name
          some ns, _ in data.inventory.namespace
          ns != input.review.object.metadata.namespace
          data.inventory.namespace[ns].v1.Service[name]
          msg := concat(" ", ["service name", name, "is already used in namespace", ns])
      }
"#;

fn client() -> Client {
    let registry = TargetRegistry::builder()
        .register(AdmissionTarget::new())
        .unwrap()
        .build();
    Client::new(registry, ClientConfig::default())
}

fn pod(namespace: &str, labels: Value) -> Value {
    json!({
        "kind": {"group": "", "version": "v1", "kind": "Pod"},
        "name": "web-1",
        "namespace": namespace,
        "operation": "CREATE",
        "object": {
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web-1", "namespace": namespace, "labels": labels}
        }
    })
}

fn service(namespace: &str, name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": name, "namespace": namespace}
    })
}

fn with_required_labels() -> Client {
    let client = client();
    let template: Template = serde_yaml::from_str(REQUIRED_LABELS).unwrap();
    client.add_template(&template).unwrap();
    let constraint: Constraint = serde_yaml::from_str(TEAM_LABEL).unwrap();
    client.add_constraint(constraint).unwrap();
    client
}

// ---------------------------------------------------------------------------
// 1. Required labels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_label_in_matched_namespace_violates() {
    let client = with_required_labels();
    let result = client.review(&pod("prod-eu", json!({"app": "web"}))).await.unwrap();

    assert_eq!(result.violations.len(), 1);
    let violation = &result.violations[0];
    assert_eq!(violation.target.as_str(), ADMISSION_TARGET);
    assert_eq!(violation.constraint.name.as_str(), "require-team");
    assert_eq!(violation.message, "missing required label team");
    assert_eq!(violation.details, json!({"missing": "team"}));
}

#[tokio::test]
async fn labelled_pod_passes() {
    let client = with_required_labels();
    let result = client
        .review(&pod("prod-eu", json!({"team": "payments"})))
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn match_criteria_scope_the_constraint() {
    let client = with_required_labels();
    for namespace in ["dev", "prod-sandbox"] {
        let result = client.review(&pod(namespace, json!({}))).await.unwrap();
        assert!(result.is_empty(), "namespace {namespace}: {result:?}");
    }
    let result = client.review(&service("prod-eu", "web")).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn bare_objects_are_wrapped() {
    let client = with_required_labels();
    let object = json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": "web-1", "namespace": "prod-us", "labels": {}}
    });
    let result = client.review(&object).await.unwrap();
    assert_eq!(result.violations.len(), 1);
}

#[tokio::test]
async fn objects_no_target_handles_yield_empty_result() {
    let client = with_required_labels();
    let result = client.review(&json!({"value": 15})).await.unwrap();
    assert!(result.is_empty());
}

// ---------------------------------------------------------------------------
// 2. Inventory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inventory_is_visible_to_rules() {
    let client = client();
    let template: Template = serde_yaml::from_str(UNIQUE_SERVICE).unwrap();
    client.add_template(&template).unwrap();
    let constraint: Constraint =
        serde_yaml::from_str("kind: UniqueServiceName\nname: unique-services\n").unwrap();
    client.add_constraint(constraint).unwrap();

    assert_eq!(client.add_data(&service("team-a", "web")), 1);

    let result = client.review(&service("team-b", "web")).await.unwrap();
    assert_eq!(result.violations.len(), 1);
    assert_eq!(
        result.violations[0].message,
        "service name web is already used in namespace team-a"
    );

    // The object itself, in its own namespace, is not a duplicate.
    assert!(client.review(&service("team-a", "web")).await.unwrap().is_empty());

    assert_eq!(client.remove_data(&service("team-a", "web")), 1);
    assert!(client.review(&service("team-b", "web")).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 3. Derived schema
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_match_spec_is_rejected() {
    let client = with_required_labels();
    let constraint: Constraint = serde_yaml::from_str(
        "kind: K8sRequiredLabels\nname: bad-match\nmatch:\n  namespaces: prod\n",
    )
    .unwrap();
    let err = client.add_constraint(constraint).unwrap_err();
    match err {
        WardenError::SchemaValidation { details, .. } => {
            assert!(details.iter().any(|d| d.path.starts_with("/match/namespaces")), "{details:?}");
        }
        other => panic!("expected SchemaValidation, got {other:?}"),
    }
}

#[tokio::test]
async fn constraint_schema_is_inspectable() {
    let client = with_required_labels();
    let kind = warden_core::TemplateKind::new("K8sRequiredLabels").unwrap();
    let schema = client.constraint_schema(&kind).unwrap();
    assert_eq!(
        schema["properties"]["parameters"]["properties"]["labels"]["items"]["type"],
        "string"
    );
    assert!(schema["properties"]["match"]["properties"]["excludedNamespaces"].is_object());
}

// ---------------------------------------------------------------------------
// 4. Mixed targets
// ---------------------------------------------------------------------------

const ALWAYS: &str = "package always\nimport rego.v1\n\nviolation contains {\"msg\": \"flagged\"} if { true }\n";

#[tokio::test]
async fn admission_match_spec_does_not_scope_document_target() {
    let docs = TargetName::new("docs").unwrap();
    let registry = TargetRegistry::builder()
        .register(AdmissionTarget::new())
        .unwrap()
        .register(DocumentTarget::new(docs.clone()))
        .unwrap()
        .build();
    let client = Client::new(registry, ClientConfig::default());
    let template = Template::new(warden_core::TemplateKind::new("Flag").unwrap())
        .with_target(TargetName::from_static(ADMISSION_TARGET), ALWAYS)
        .with_target(docs, ALWAYS);
    client.add_template(&template).unwrap();

    let pods_only: Constraint = serde_yaml::from_str(
        "kind: Flag\nname: pods-only\nmatch:\n  kinds:\n    - apiGroups: [\"\"]\n      kinds: [Pod]\n",
    )
    .unwrap();
    client.add_constraint(pods_only).unwrap();

    let result = client.review(&pod("prod-eu", json!({}))).await.unwrap();
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].target.as_str(), ADMISSION_TARGET);

    // The document target ignores a spec written for admission requests.
    let result = client.review(&json!({"kind": "Pod"})).await.unwrap();
    assert!(result.is_empty(), "{result:?}");

    let jobs: Constraint =
        serde_yaml::from_str("kind: Flag\nname: jobs\nmatch:\n  kinds: [Job]\n").unwrap();
    client.add_constraint(jobs).unwrap();
    let result = client.review(&json!({"kind": "Job"})).await.unwrap();
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].target.as_str(), "docs");
}
