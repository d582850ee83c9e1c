//! # Derived Constraint Schema
//!
//! Every constraint of a template must satisfy:
//!
//! ```text
//! {
//!   enforcementAction: string,
//!   parameters: <template schema, resolved legacy/strict; Any if absent>,
//!   match: <the match schema of a declared target>
//! }
//! ```
//!
//! The root is strict. Match schemas are always resolved strictly. Targets
//! interpret match specs differently, so a spec only has to satisfy the
//! schema of one declared target; it scopes reviews on the targets whose
//! schema accepts it and excludes the constraint from the others.

use std::collections::BTreeMap;

use serde_json::Value;
use warden_core::{Constraint, SchemaViolation, TargetName, Template, TemplateKind, WardenError};
use warden_schema::{Schema, UnknownFields};
use warden_target::TargetRegistry;

/// The schema constraints of one template are validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSchema {
    kind: TemplateKind,
    parameters: Schema,
    matches: BTreeMap<TargetName, Schema>,
}

impl ConstraintSchema {
    /// Derive the schema of `template`'s constraints.
    ///
    /// Targets the registry does not know contribute no match schema; they
    /// fail compilation separately.
    ///
    /// # Errors
    ///
    /// [`WardenError::SchemaValidation`] if the parameter schema is
    /// malformed.
    pub fn derive(template: &Template, registry: &TargetRegistry) -> Result<Self, WardenError> {
        let parameters = match &template.validation.open_api_v3_schema {
            Some(document) => {
                Schema::parse(document).map_err(|err| err.into_warden(template.kind.as_str()))?
            }
            None => Schema::any(),
        }
        .with_unknown_field_policy(template.validation.legacy_schema);

        let matches = template
            .targets
            .keys()
            .filter_map(|target| {
                let handler = registry.get(target)?;
                Some((target.clone(), handler.match_schema().with_unknown_field_policy(false)))
            })
            .collect();

        Ok(Self {
            kind: template.kind.clone(),
            parameters,
            matches,
        })
    }

    /// The resolved parameter schema.
    pub fn parameters(&self) -> &Schema {
        &self.parameters
    }

    /// The resolved match schema of one target.
    pub fn match_schema(&self, target: &TargetName) -> Option<&Schema> {
        self.matches.get(target)
    }

    /// Validate a constraint's parameters and match spec.
    ///
    /// Absent (`null`) parameters are not validated. A match spec is valid
    /// if at least one declared target's schema accepts it; otherwise every
    /// target's violations are reported. Violation paths are rooted at the
    /// constraint (`/parameters/...`, `/match/...`).
    ///
    /// # Errors
    ///
    /// [`WardenError::SchemaValidation`] listing every violation, with the
    /// constraint key as subject.
    pub fn validate(&self, constraint: &Constraint) -> Result<(), WardenError> {
        let mut details = Vec::new();

        if !constraint.parameters.is_null() {
            details.extend(
                self.parameters
                    .violations(&constraint.parameters)
                    .into_iter()
                    .map(|v| SchemaViolation::new(format!("/parameters{}", v.path), v.message)),
            );
        }

        if let Some(spec) = &constraint.match_spec {
            let mut rejected = Vec::new();
            let mut accepted = self.matches.is_empty();
            for (target, schema) in &self.matches {
                let violations = schema.violations(spec);
                if violations.is_empty() {
                    accepted = true;
                    break;
                }
                rejected.extend(violations.into_iter().map(|v| {
                    SchemaViolation::new(
                        format!("/match{}", v.path),
                        format!("{} (target {target})", v.message),
                    )
                }));
            }
            if !accepted {
                details.extend(rejected);
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(WardenError::SchemaValidation {
                subject: constraint.key().to_string(),
                details,
            })
        }
    }

    /// Whether `spec` scopes `target`: an absent spec applies everywhere,
    /// otherwise the target's match schema must accept it. Targets without
    /// a match schema (unknown to the registry) never apply to a spec.
    pub fn match_applies(&self, target: &TargetName, spec: Option<&Value>) -> bool {
        match spec {
            None => true,
            Some(spec) => self
                .matches
                .get(target)
                .is_some_and(|schema| schema.violations(spec).is_empty()),
        }
    }

    /// The full constraint schema as a tree.
    pub fn root(&self) -> Schema {
        let mut properties = vec![
            ("enforcementAction", Schema::string()),
            ("parameters", self.parameters.clone()),
        ];
        let mut matches = self.matches.values();
        match (matches.next(), matches.next()) {
            (Some(only), None) => properties.push(("match", only.clone())),
            (Some(_), Some(_)) => properties.push((
                "match",
                Schema::any().with_description("must satisfy the match schema of at least one target"),
            )),
            _ => {}
        }
        Schema::object(properties)
            .with_unknown_fields(UnknownFields::Reject)
            .with_description(format!("Constraints of kind {}", self.kind))
    }

    /// Render the full constraint schema as OpenAPI v3.
    pub fn to_openapi(&self) -> Value {
        self.root().to_openapi()
    }
}
