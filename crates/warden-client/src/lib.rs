//! # warden-client — Policy Engine Client
//!
//! Ties the workspace together. A [`Client`] owns a template compiler, a
//! policy store, and a cache over a frozen target registry, and exposes the
//! template and constraint lifecycle plus reviews.
//!
//! ```no_run
//! use serde_json::json;
//! use warden_client::{Client, ClientConfig};
//! use warden_core::{Constraint, ConstraintName, TargetName, Template, TemplateKind};
//! use warden_target::{DocumentTarget, TargetRegistry};
//!
//! # async fn demo() -> Result<(), warden_core::WardenError> {
//! let registry = TargetRegistry::builder()
//!     .register(DocumentTarget::new(TargetName::new("docs")?))?
//!     .build();
//! let client = Client::new(registry, ClientConfig::from_env()?);
//!
//! let kind = TemplateKind::new("MaxValue")?;
//! client.add_template(&Template::new(kind.clone()).with_target(
//!     TargetName::new("docs")?,
//!     "package maxvalue\nimport rego.v1\n\nviolation contains {\"msg\": \"too big\"} if {\n    input.review.value > input.parameters.max\n}\n",
//! ))?;
//! client.add_constraint(
//!     Constraint::new(kind, ConstraintName::new("max-10")?).with_parameters(json!({"max": 10})),
//! )?;
//!
//! let result = client.review(&json!({"value": 15})).await?;
//! assert_eq!(result.violations.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Review semantics
//!
//! Targets are visited in registration order and constraints in add order.
//! A target that fails is reported in [`ReviewResult::errors`] and the
//! others continue; the review itself fails only when every target that
//! handled the object failed.
//!
//! [`ReviewResult::errors`]: warden_core::ReviewResult::errors

pub mod client;
pub mod config;
pub mod review;

pub use client::{Client, TemplateChange, TemplateStatus};
pub use config::{ClientConfig, DEFAULT_QUERY_TIMEOUT};
pub use review::ReviewOptions;
