//! # warden-target — Target Handlers
//!
//! A target is a domain of reviewable objects. Each target knows how to turn
//! an incoming object into evaluator input, how to decide whether a
//! constraint's `match` block applies to it, and what that block may contain.
//!
//! ## Design
//!
//! - **Trait objects:** handlers implement [`TargetHandler`] and are stored as
//!   `Arc<dyn TargetHandler>`. New targets plug in without touching the
//!   engine.
//! - **Frozen registry:** [`TargetRegistry`] is assembled once through
//!   [`TargetRegistryBuilder`] and never mutated afterwards, so it can be
//!   shared freely between the compiler and the review engine.
//! - **Deterministic order:** iteration follows registration order, which
//!   fixes the order of violations in a review.

pub mod admission;
pub mod document;
pub mod handler;
pub mod registry;

pub use admission::{AdmissionTarget, ADMISSION_TARGET};
pub use document::DocumentTarget;
pub use handler::{DataEntry, TargetHandler};
pub use registry::{TargetRegistry, TargetRegistryBuilder};

/// Match a value against a pattern where a trailing `*` matches any suffix.
pub(crate) fn prefix_glob(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

#[cfg(test)]
mod tests {
    use super::prefix_glob;

    #[test]
    fn glob_matches_prefix_and_exact() {
        assert!(prefix_glob("kube-*", "kube-system"));
        assert!(prefix_glob("*", "anything"));
        assert!(prefix_glob("default", "default"));
        assert!(!prefix_glob("default", "default2"));
        assert!(!prefix_glob("kube-*", "prod"));
    }
}
