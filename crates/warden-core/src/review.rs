//! # Review Results
//!
//! The ephemeral output of a review: violations in a deterministic order,
//! plus any per-target errors encountered along the way. A failure in one
//! target never discards violations found by another.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constraint::EnforcementAction;
use crate::identity::{ConstraintKey, TargetName, TemplateKind};

/// One rule match for one constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// The constraint that produced this violation.
    pub constraint: ConstraintKey,
    /// The target whose rule fired.
    pub target: TargetName,
    /// The constraint's enforcement action, passed through unchanged.
    pub enforcement_action: EnforcementAction,
    /// The `msg` emitted by the rule.
    pub message: String,
    /// The `details` emitted by the rule (`null` when absent).
    #[serde(default)]
    pub details: Value,
}

/// A failure scoped to one target during a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewError {
    /// The target that failed.
    pub target: TargetName,
    /// The template kind involved, when the failure is specific to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TemplateKind>,
    /// Human-readable reason.
    pub message: String,
}

impl std::fmt::Display for ReviewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{} ({}): {}", self.target, kind, self.message),
            None => write!(f, "{}: {}", self.target, self.message),
        }
    }
}

/// Aggregated result of a review.
///
/// Violations are ordered by target registration order, then by constraint
/// add order, then by the order the evaluator returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Every violation found.
    pub violations: Vec<Violation>,
    /// Per-target failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ReviewError>,
}

impl ReviewResult {
    /// `true` when there are no violations and no errors.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty() && self.errors.is_empty()
    }

    /// `true` when at least one target reported an error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Violations produced by `target`.
    pub fn for_target<'a>(&'a self, target: &'a TargetName) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| &v.target == target)
    }

    /// Violations produced by the constraint `key`.
    pub fn for_constraint<'a>(
        &'a self,
        key: &'a ConstraintKey,
    ) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| &v.constraint == key)
    }

    /// Errors reported by `target`.
    pub fn errors_for<'a>(&'a self, target: &'a TargetName) -> impl Iterator<Item = &'a ReviewError> {
        self.errors.iter().filter(move |e| &e.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ConstraintName;
    use serde_json::json;

    fn violation(target: &str, name: &str) -> Violation {
        Violation {
            constraint: ConstraintKey::new(
                TemplateKind::new("K").unwrap(),
                ConstraintName::new(name).unwrap(),
            ),
            target: TargetName::new(target).unwrap(),
            enforcement_action: EnforcementAction::default(),
            message: "too big".to_string(),
            details: json!({"value": 15}),
        }
    }

    #[test]
    fn filters_by_target_and_constraint() {
        let result = ReviewResult {
            violations: vec![violation("t1", "c1"), violation("t2", "c1"), violation("t1", "c2")],
            errors: Vec::new(),
        };
        let t1 = TargetName::new("t1").unwrap();
        assert_eq!(result.for_target(&t1).count(), 2);
        let c1 = result.violations[0].constraint.clone();
        assert_eq!(result.for_constraint(&c1).count(), 2);
        assert!(!result.has_errors());
        assert!(!result.is_empty());
    }

    #[test]
    fn default_is_empty() {
        assert!(ReviewResult::default().is_empty());
    }

    #[test]
    fn review_error_display_includes_kind() {
        let err = ReviewError {
            target: TargetName::new("t2").unwrap(),
            kind: Some(TemplateKind::new("K").unwrap()),
            message: "not compiled".to_string(),
        };
        assert_eq!(err.to_string(), "t2 (K): not compiled");
    }

    #[test]
    fn serializes_without_empty_errors() {
        let result = ReviewResult {
            violations: vec![violation("t1", "c1")],
            errors: Vec::new(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("errors").is_none());
        assert_eq!(value["violations"][0]["enforcementAction"], "deny");
        assert_eq!(value["violations"][0]["constraint"]["name"], "c1");
    }
}
