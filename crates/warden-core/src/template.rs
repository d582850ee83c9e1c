//! # Templates
//!
//! A template is a reusable policy definition: a parameter schema plus one
//! rule body per target. Templates are plain values here; compilation lives
//! in `warden-compiler`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::{TargetName, TemplateKind};

/// A policy template as handed over by the resource layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// The constraint kind this template creates. Unique within a cache.
    pub kind: TemplateKind,
    /// Aliases for the generated constraint kind.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short_names: Vec<String>,
    /// Parameter schema and its unknown-field policy.
    #[serde(default)]
    pub validation: Validation,
    /// Rule source per target.
    pub targets: BTreeMap<TargetName, TargetRule>,
}

impl Template {
    /// Create a template with no schema and no targets.
    pub fn new(kind: TemplateKind) -> Self {
        Self {
            kind,
            short_names: Vec::new(),
            validation: Validation::default(),
            targets: BTreeMap::new(),
        }
    }

    /// Add (or replace) the rule source for a target.
    pub fn with_target(mut self, target: TargetName, rego: impl Into<String>) -> Self {
        self.targets.insert(target, TargetRule::new(rego));
        self
    }

    /// Add (or replace) a target rule including its libraries.
    pub fn with_target_rule(mut self, target: TargetName, rule: TargetRule) -> Self {
        self.targets.insert(target, rule);
        self
    }

    /// Set the OpenAPI v3 parameter schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.validation.open_api_v3_schema = Some(schema);
        self
    }

    /// Set the legacy (permissive) unknown-field policy.
    pub fn with_legacy_schema(mut self, legacy: bool) -> Self {
        self.validation.legacy_schema = legacy;
        self
    }

    /// Set the short names of the constraint kind.
    pub fn with_short_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.short_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Parameter schema of a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    /// When `true`, object nodes without an explicit unknown-field policy
    /// accept undeclared properties. When `false` they reject them.
    #[serde(default)]
    pub legacy_schema: bool,
    /// OpenAPI v3 schema of the constraint's `parameters` field.
    #[serde(
        default,
        rename = "openAPIV3Schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub open_api_v3_schema: Option<Value>,
}

/// Rule source for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRule {
    /// The main Rego module. Must define the `violation` entry point.
    pub rego: String,
    /// Library modules (`package lib.<name>`) the main module may import.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libs: Vec<String>,
}

impl TargetRule {
    /// A rule with no libraries.
    pub fn new(rego: impl Into<String>) -> Self {
        Self {
            rego: rego.into(),
            libs: Vec::new(),
        }
    }

    /// Attach a library module.
    pub fn with_lib(mut self, lib: impl Into<String>) -> Self {
        self.libs.push(lib.into());
        self
    }
}
