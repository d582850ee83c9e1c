#![deny(missing_docs)]

//! # warden-core — Foundational Types for Warden
//!
//! This crate defines the values every other crate in the workspace passes
//! around. It has no internal crate dependencies, only `serde`,
//! `serde_json`, and `thiserror` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Validated identifiers.** [`TemplateKind`], [`ConstraintName`], and
//!    [`TargetName`] check their format at construction time. A kind that
//!    could not appear inside a Rego package path never reaches the compiler.
//!
//! 2. **Plain structured values at the boundary.** [`Template`] and
//!    [`Constraint`] are what the (external) resource layer hands to the
//!    engine. They carry no compiled state.
//!
//! 3. **Single [`WardenError`] taxonomy.** Every operation in the workspace
//!    reports failures through it, with enough structure to identify the
//!    offending template, constraint, or target.

pub mod constraint;
pub mod error;
pub mod identity;
pub mod outcome;
pub mod review;
pub mod template;

// Re-export primary types at crate root for ergonomic imports.
pub use constraint::{Constraint, EnforcementAction};
pub use error::{SchemaViolation, TargetFailure, ValidationError, WardenError};
pub use identity::{validate_short_name, ConstraintKey, ConstraintName, TargetName, TemplateKind};
pub use outcome::Removal;
pub use review::{ReviewError, ReviewResult, Violation};
pub use template::{TargetRule, Template, Validation};

/// Name of the rule every template must define for each of its targets.
///
/// The review engine queries this rule after compilation; a template that
/// does not define it is rejected at add time.
pub const ENTRY_POINT: &str = "violation";
