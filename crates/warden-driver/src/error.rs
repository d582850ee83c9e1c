//! # Driver Errors

use std::time::Duration;

use thiserror::Error;
use warden_core::WardenError;

/// Errors raised by the policy store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// A module failed to parse or declares the wrong package.
    #[error("module {module} rejected: {reason}")]
    Compile {
        /// The module identifier.
        module: String,
        /// Evaluator diagnostic.
        reason: String,
    },

    /// A query named a module the store does not hold.
    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// The evaluator failed while running a query.
    #[error("evaluation failed for target {target}: {reason}")]
    Evaluation {
        /// The target being queried.
        target: String,
        /// Evaluator diagnostic.
        reason: String,
    },

    /// A query did not finish within its time budget.
    #[error("evaluation for target {target} timed out after {after:?}")]
    Timeout {
        /// The target being queried.
        target: String,
        /// The budget that was exceeded.
        after: Duration,
    },
}

impl From<DriverError> for WardenError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Compile { module, reason } => WardenError::Compile { module, reason },
            DriverError::UnknownModule(module) => WardenError::UnknownModule(module),
            DriverError::Evaluation { target, reason } => WardenError::Evaluation { target, reason },
            DriverError::Timeout { target, after } => WardenError::Evaluation {
                target,
                reason: format!("timed out after {after:?}"),
            },
        }
    }
}

/// Render an evaluator error with its full cause chain.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
