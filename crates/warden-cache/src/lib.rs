//! # warden-cache — Template and Constraint Cache
//!
//! Holds compiled templates and the constraints that instantiate them.
//!
//! ## Design
//!
//! - **Copy-on-write snapshots.** State lives in an `Arc<CacheSnapshot>`
//!   behind a `parking_lot::RwLock`. Readers clone the `Arc`; writers apply
//!   their change to the latest snapshot and swap. A review holding a
//!   snapshot never sees a half-applied change.
//! - **Per-key exclusion.** [`KeyLocks`] stripes locks by key. Template
//!   mutations hold their kind's stripe exclusively; constraint mutations
//!   hold their kind's stripe shared and their own key's stripe
//!   exclusively. Unrelated keys proceed in parallel.
//! - **Referential integrity.** A constraint can only be added for a cached
//!   template. Removing a template cascades to its constraints, or under
//!   [`OrphanPolicy::Retain`] marks them orphaned until the kind returns.

pub mod cache;
pub mod config;
pub mod locks;
pub mod snapshot;

pub use cache::{Cache, Installed, Upsert};
pub use config::{CacheConfig, OrphanPolicy};
pub use locks::{AllKeysGuard, ConstraintGuard, KeyLocks, TemplateGuard};
pub use snapshot::{CacheSnapshot, ConstraintEntry, ConstraintStatus, TargetConstraint};
