//! # Schema Errors

use thiserror::Error;
use warden_core::{SchemaViolation, WardenError};

/// Errors returned by schema parsing and validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema document itself is not well formed.
    #[error("malformed schema at {}: {reason}", display_path(.path))]
    Malformed {
        /// JSON Pointer into the schema document.
        path: String,
        /// What is wrong with the node.
        reason: String,
    },

    /// A value failed validation.
    #[error("{} validation error(s)", .0.len())]
    Violations(Vec<SchemaViolation>),
}

impl SchemaError {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Convert into the workspace error, naming what was validated.
    pub fn into_warden(self, subject: impl Into<String>) -> WardenError {
        let details = match self {
            Self::Malformed { path, reason } => vec![SchemaViolation::new(path, reason)],
            Self::Violations(details) => details,
        };
        WardenError::SchemaValidation {
            subject: subject.into(),
            details,
        }
    }
}

impl From<SchemaError> for WardenError {
    fn from(err: SchemaError) -> Self {
        err.into_warden("schema")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_converts_to_single_detail() {
        let err = SchemaError::malformed("/properties/x", "unknown type \"strin\"");
        match err.into_warden("K") {
            WardenError::SchemaValidation { subject, details } => {
                assert_eq!(subject, "K");
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].path, "/properties/x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn root_path_is_displayed_readably() {
        let err = SchemaError::malformed("", "expected an object");
        assert!(err.to_string().contains("<root>"));
    }
}
