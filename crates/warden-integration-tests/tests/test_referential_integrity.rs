//! # Referential Integrity
//!
//! A constraint can never exist without its template, whatever its
//! parameters; removing a template takes its constraints with it (cascade)
//! or parks them (retain).

use proptest::prelude::*;
use serde_json::{json, Value};
use warden_cache::OrphanPolicy;
use warden_client::{Client, ClientConfig};
use warden_core::{Constraint, ConstraintName, TargetName, Template, TemplateKind, WardenError};
use warden_target::{DocumentTarget, TargetRegistry};

fn client(config: ClientConfig) -> Client {
    let registry = TargetRegistry::builder()
        .register(DocumentTarget::new(TargetName::new("t1").unwrap()))
        .unwrap()
        .build();
    Client::new(registry, config)
}

fn template(k: &str) -> Template {
    Template::new(TemplateKind::new(k).unwrap()).with_target(
        TargetName::new("t1").unwrap(),
        "package p\nimport rego.v1\n\nviolation contains {\"msg\": \"hit\"} if { input.review.hit }\n",
    )
}

fn parameters() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

// ---------------------------------------------------------------------------
// 1. Unknown kinds
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn unknown_kind_is_always_rejected(
        kind in "[A-Z][A-Za-z0-9]{0,20}",
        name in "[a-z][a-z0-9-]{0,20}[a-z0-9]",
        params in parameters(),
    ) {
        let client = client(ClientConfig::default());
        client.add_template(&template("Known")).unwrap();
        prop_assume!(kind != "Known");

        let constraint = Constraint::new(
            TemplateKind::new(kind).unwrap(),
            ConstraintName::new(name).unwrap(),
        )
        .with_parameters(params);

        let added = client.add_constraint(constraint.clone());
        prop_assert!(matches!(added, Err(WardenError::UnknownTemplate(_))));
        let checked = client.validate_constraint(&constraint);
        prop_assert!(matches!(checked, Err(WardenError::UnknownTemplate(_))));
        prop_assert!(client.list_constraints().is_empty());
    }
}

// ---------------------------------------------------------------------------
// 2. Template removal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cascade_removes_constraints_with_template() {
    let client = client(ClientConfig::default());
    let kind = TemplateKind::new("K").unwrap();
    client.add_template(&template("K")).unwrap();
    client
        .add_constraint(Constraint::new(kind.clone(), ConstraintName::new("c1").unwrap()))
        .unwrap();

    client.remove_template(&kind).unwrap();
    assert!(client.list_constraints().is_empty());

    // Re-adding the template does not bring the constraint back.
    client.add_template(&template("K")).unwrap();
    assert!(client.review(&json!({"hit": true})).await.unwrap().is_empty());
}

#[tokio::test]
async fn retain_parks_constraints_until_template_returns() {
    let client = client(ClientConfig::default().with_orphan_policy(OrphanPolicy::Retain));
    let kind = TemplateKind::new("K").unwrap();
    client.add_template(&template("K")).unwrap();
    client
        .add_constraint(Constraint::new(kind.clone(), ConstraintName::new("c1").unwrap()))
        .unwrap();

    client.remove_template(&kind).unwrap();
    assert_eq!(client.list_constraints().len(), 1);
    assert_eq!(client.dump()["constraints"][0]["status"], "orphaned");
    assert!(client.review(&json!({"hit": true})).await.unwrap().is_empty());

    // An orphan still cannot be replaced while its template is gone.
    let err = client
        .add_constraint(Constraint::new(kind.clone(), ConstraintName::new("c1").unwrap()))
        .unwrap_err();
    assert!(matches!(err, WardenError::UnknownTemplate(_)));

    client.add_template(&template("K")).unwrap();
    assert_eq!(client.dump()["constraints"][0]["status"], "active");
    assert_eq!(client.review(&json!({"hit": true})).await.unwrap().violations.len(), 1);
}
