//! # Constraints
//!
//! A constraint instantiates a template with concrete parameters, an
//! enforcement action, and an optional match specification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::{ConstraintKey, ConstraintName, TemplateKind};

/// A constraint as handed over by the resource layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// The template kind this constraint instantiates.
    pub kind: TemplateKind,
    /// The constraint's name, unique within its kind.
    pub name: ConstraintName,
    /// Parameter values, validated against the template schema at add time.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
    /// What the caller should do on violation. Not interpreted by the engine.
    #[serde(default)]
    pub enforcement_action: EnforcementAction,
    /// Scoping of the inputs this constraint applies to, interpreted by each
    /// target handler. `None` matches every input the target handles.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_spec: Option<Value>,
}

impl Constraint {
    /// Create a constraint with no parameters, no match spec, and the
    /// default enforcement action.
    pub fn new(kind: TemplateKind, name: ConstraintName) -> Self {
        Self {
            kind,
            name,
            parameters: Value::Null,
            enforcement_action: EnforcementAction::default(),
            match_spec: None,
        }
    }

    /// The constraint's identity.
    pub fn key(&self) -> ConstraintKey {
        ConstraintKey::new(self.kind.clone(), self.name.clone())
    }

    /// Set the parameter values.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the enforcement action.
    pub fn with_enforcement_action(mut self, action: impl Into<String>) -> Self {
        self.enforcement_action = EnforcementAction::new(action);
        self
    }

    /// Set the match specification.
    pub fn with_match(mut self, match_spec: Value) -> Self {
        self.match_spec = Some(match_spec);
        self
    }
}

/// An opaque, caller-defined label (e.g. `deny`, `warn`, `dryrun`).
///
/// Empty values normalise to [`EnforcementAction::DEFAULT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EnforcementAction(String);

impl EnforcementAction {
    /// The action used when a constraint does not set one.
    pub const DEFAULT: &'static str = "deny";

    /// Wrap an action label.
    pub fn new(action: impl Into<String>) -> Self {
        let action = action.into();
        if action.trim().is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(action)
        }
    }

    /// Access the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EnforcementAction {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl From<String> for EnforcementAction {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<EnforcementAction> for String {
    fn from(action: EnforcementAction) -> Self {
        action.0
    }
}

impl std::fmt::Display for EnforcementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
