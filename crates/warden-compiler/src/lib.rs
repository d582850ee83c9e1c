//! # warden-compiler — Template Compilation
//!
//! Turns a [`Template`](warden_core::Template) into a [`CompiledTemplate`]:
//! one isolated Rego module per target plus the schema every constraint of
//! the template must satisfy. Compilation is pure; nothing is registered
//! with the policy store here.
//!
//! ## Per-target pipeline
//!
//! 1. The target must be registered.
//! 2. The main module's `package` is rewritten to the stable module id
//!    `templates.<target>.<Kind>`.
//! 3. Libraries (`package lib.<name>`) are moved beneath the module and
//!    `data.lib.` references are rewritten to follow them.
//! 4. Any other reference to `data` than `data.inventory` is rejected, so a
//!    template cannot read another template's modules.
//! 5. The rewritten sources must parse, and the main module must define the
//!    `violation` entry point at top level.
//!
//! Failures are per target. Under [`CompilePolicy::BestEffort`] a template
//! is usable when at least one target compiled; under
//! [`CompilePolicy::Strict`] every target must compile.

pub mod compiler;
pub mod schema;
pub mod source;

pub use compiler::{CompilePolicy, CompiledArtifact, CompiledTemplate, TemplateCompiler};
pub use schema::ConstraintSchema;
