//! # Error Hierarchy
//!
//! Structured error types for the whole workspace, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Errors fall into four groups:
//!
//! - **User input.** [`WardenError::SchemaValidation`],
//!   [`WardenError::Validation`]. Surfaced to the caller, never retried.
//! - **Referential integrity.** [`WardenError::UnknownTarget`],
//!   [`WardenError::UnknownTemplate`], [`WardenError::UnknownModule`].
//! - **Template content.** [`WardenError::RuleSyntax`],
//!   [`WardenError::MissingEntryPoint`], [`WardenError::Compile`],
//!   [`WardenError::TemplateRejected`]. Surfaced at add time; the cache is
//!   left unchanged.
//! - **Runtime.** [`WardenError::Evaluation`]. Reported per target during a
//!   review and never corrupts cache state.

use thiserror::Error;

use crate::identity::TargetName;

/// Top-level error type for Warden.
#[derive(Error, Debug)]
pub enum WardenError {
    /// A schema is malformed, or a value does not satisfy its schema.
    #[error("schema validation failed for {subject}: {}", summarize(.details))]
    SchemaValidation {
        /// What was being validated (template kind, constraint key, ...).
        subject: String,
        /// Individual violations.
        details: Vec<SchemaViolation>,
    },

    /// A target name is not present in the registry.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// A constraint references a template kind that is not loaded.
    #[error("unknown template kind: {0}")]
    UnknownTemplate(String),

    /// A query references a module the policy store does not hold.
    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// Rule source for a target failed to parse or uses a forbidden construct.
    #[error("rule syntax error in template {kind} for target {target}: {reason}")]
    RuleSyntax {
        /// The template kind.
        kind: String,
        /// The target whose rule source failed.
        target: String,
        /// Parser or checker diagnostic.
        reason: String,
    },

    /// Rule source for a target does not define the entry point rule.
    #[error("template {kind} does not define entry point `{entry_point}` for target {target}")]
    MissingEntryPoint {
        /// The template kind.
        kind: String,
        /// The target whose rule source is incomplete.
        target: String,
        /// The rule name the review engine queries.
        entry_point: String,
    },

    /// The evaluator rejected a module at registration time.
    #[error("module {module} rejected by the evaluator: {reason}")]
    Compile {
        /// The module identifier.
        module: String,
        /// Evaluator diagnostic.
        reason: String,
    },

    /// A query failed at runtime (engine fault, timeout, undecodable result).
    #[error("evaluation failed for target {target}: {reason}")]
    Evaluation {
        /// The target (or targets) whose evaluation failed.
        target: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A target handler was registered twice.
    #[error("target already registered: {0}")]
    DuplicateTarget(String),

    /// No target of a template compiled (or any failed under the strict policy).
    #[error("template {kind} rejected: {}", summarize_failures(.failures))]
    TemplateRejected {
        /// The template kind.
        kind: String,
        /// Per-target failures.
        failures: Vec<TargetFailure>,
    },

    /// Identifier format validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single schema violation: where it happened and what was wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON Pointer to the offending node (`""` for the root).
    pub path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl SchemaViolation {
    /// Build a violation at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "<root>: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A compilation failure for one target of a template.
#[derive(Debug)]
pub struct TargetFailure {
    /// The target that failed.
    pub target: TargetName,
    /// Why it failed.
    pub error: WardenError,
}

impl std::fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

fn summarize(details: &[SchemaViolation]) -> String {
    details
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn summarize_failures(failures: &[TargetFailure]) -> String {
    if failures.is_empty() {
        return "no targets declared".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validation errors for identifier newtypes.
///
/// Each carries the rejected input so operators can diagnose a bad resource
/// without guesswork.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Template kind is not `[A-Za-z][A-Za-z0-9]*` (max 63 chars).
    #[error("invalid template kind: \"{0}\" (expected [A-Za-z][A-Za-z0-9]*, at most 63 characters)")]
    InvalidTemplateKind(String),

    /// Constraint name is not a DNS-1123 subdomain.
    #[error("invalid constraint name: \"{0}\" (expected lowercase alphanumerics, '-' or '.')")]
    InvalidConstraintName(String),

    /// Target name is malformed or collides with a Rego keyword.
    #[error("invalid target name: \"{0}\" (expected lowercase alphanumerics, '.' or '-', not a Rego keyword)")]
    InvalidTargetName(String),

    /// Short name is not lowercase alphanumeric.
    #[error("invalid short name: \"{0}\" (expected lowercase alphanumerics or '-')")]
    InvalidShortName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_validation_display_lists_every_detail() {
        let err = WardenError::SchemaValidation {
            subject: "RequiredLabels/c1".to_string(),
            details: vec![
                SchemaViolation::new("/parameters/extra", "unknown field"),
                SchemaViolation::new("", "expected object"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("RequiredLabels/c1"));
        assert!(msg.contains("/parameters/extra: unknown field"));
        assert!(msg.contains("<root>: expected object"));
    }

    #[test]
    fn template_rejected_display_lists_failures() {
        let err = WardenError::TemplateRejected {
            kind: "K".to_string(),
            failures: vec![TargetFailure {
                target: TargetName::new("t1").unwrap(),
                error: WardenError::UnknownTarget("t1".to_string()),
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("template K rejected"));
        assert!(msg.contains("t1: unknown target: t1"));
    }

    #[test]
    fn template_rejected_without_targets() {
        let err = WardenError::TemplateRejected {
            kind: "K".to_string(),
            failures: Vec::new(),
        };
        assert!(err.to_string().contains("no targets declared"));
    }

    #[test]
    fn missing_entry_point_display() {
        let err = WardenError::MissingEntryPoint {
            kind: "K".to_string(),
            target: "t1".to_string(),
            entry_point: "violation".to_string(),
        };
        assert!(err.to_string().contains("`violation`"));
    }

    #[test]
    fn validation_error_converts_into_warden_error() {
        let err: WardenError = ValidationError::InvalidTemplateKind("1x".to_string()).into();
        assert!(matches!(err, WardenError::Validation(_)));
        assert!(err.to_string().contains("1x"));
    }

    #[test]
    fn all_error_types_are_debug() {
        let e1 = WardenError::Evaluation {
            target: "t".to_string(),
            reason: "timeout".to_string(),
        };
        let e2 = ValidationError::InvalidShortName("X".to_string());
        assert!(!format!("{e1:?}").is_empty());
        assert!(!format!("{e2:?}").is_empty());
    }
}
