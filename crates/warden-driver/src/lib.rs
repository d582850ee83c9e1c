//! # warden-driver — Policy Store
//!
//! The only crate that talks to the Rego evaluator (`regorus`). It owns the
//! registered modules and the per-target external data, and answers queries
//! against an immutable snapshot of both.
//!
//! ## Design Principles
//!
//! 1. **Prepare, then commit.** Every module change is parsed in a scratch
//!    engine first ([`PolicyStore::prepare`]); only a validated
//!    [`PreparedChange`] can be committed, and the commit is a single
//!    pointer swap.
//! 2. **Snapshots are values.** [`StoreSnapshot`] is an `Arc` of immutable
//!    state. A review holding a snapshot is never affected by later commits.
//! 3. **Evaluation is bounded.** Queries run on the blocking pool under
//!    `tokio::time::timeout`; a slow rule costs its own target, nothing else.
//! 4. **Isolation.** A query loads only the requested modules (plus their
//!    libraries) and the target's data, so rules cannot observe other
//!    templates.

pub mod data;
pub mod error;
pub mod module;
pub mod rego;
pub mod store;

pub use error::DriverError;
pub use module::{ModuleChange, ModuleId};
pub use store::{
    Committed, PolicyStore, PreparedChange, QueryConstraint, RawResult, StoreSnapshot,
    DEFAULT_MAX_EVALUATIONS,
};
