//! # warden-schema — Structural Schemas
//!
//! Templates declare the shape of their constraints' `parameters` as an
//! OpenAPI v3 schema. This crate turns that document into a typed tree
//! ([`Schema`]) and validates values against it.
//!
//! ## Responsibilities
//!
//! - **Parsing:** [`Schema::parse`] walks the OpenAPI document and rejects
//!   unknown `type` values and malformed keyword shapes.
//! - **Unknown-field policy:** [`Schema::with_unknown_field_policy`] resolves
//!   every object node to either reject or preserve undeclared properties.
//!   Legacy templates preserve them; new templates reject them unless a node
//!   opts in explicitly.
//! - **Validation:** [`Schema::validate`] is a pure recursive walk that
//!   reports every violation with a JSON Pointer path.
//! - **Rendering:** [`Schema::to_openapi`] produces the resolved schema, so
//!   the derived constraint schema can be inspected or published.

pub mod error;
pub mod openapi;
pub mod tree;
pub mod validate;

// Re-export primary types.
pub use error::SchemaError;
pub use tree::{ArraySchema, ObjectSchema, Schema, SchemaKind, UnknownFields};
