//! # Striped Key Locks
//!
//! A fixed array of `parking_lot::RwLock<()>` per key space, indexed by
//! key hash. Kinds and constraint keys use separate arrays, and constraint
//! guards always lock the kind before the key, so guards cannot deadlock.
//! Two keys sharing a stripe merely serialize.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use warden_core::{ConstraintKey, TemplateKind};

/// Stripes per key space when none is configured.
pub const DEFAULT_STRIPES: usize = 64;

/// Striped per-key locks for templates and constraints.
pub struct KeyLocks {
    kinds: Box<[RwLock<()>]>,
    constraints: Box<[RwLock<()>]>,
}

impl KeyLocks {
    /// Create locks with `stripes` stripes per key space (at least one).
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        let make = || (0..stripes).map(|_| RwLock::new(())).collect::<Vec<_>>().into_boxed_slice();
        Self {
            kinds: make(),
            constraints: make(),
        }
    }

    /// Exclusive access to one template kind.
    pub fn lock_template(&self, kind: &TemplateKind) -> TemplateGuard<'_> {
        TemplateGuard {
            kind: kind.clone(),
            _kind: stripe(&self.kinds, kind).write(),
        }
    }

    /// Shared access to the constraint's kind plus exclusive access to the
    /// constraint.
    pub fn lock_constraint(&self, key: &ConstraintKey) -> ConstraintGuard<'_> {
        let kind = stripe(&self.kinds, &key.kind).read();
        let constraint = stripe(&self.constraints, key).write();
        ConstraintGuard {
            key: key.clone(),
            _constraint: constraint,
            _kind: kind,
        }
    }

    /// Exclusive access to every kind, and so to every constraint.
    pub fn lock_all(&self) -> AllKeysGuard<'_> {
        AllKeysGuard {
            _kinds: self.kinds.iter().map(|stripe| stripe.write()).collect(),
        }
    }

    /// Number of stripes per key space.
    pub fn stripes(&self) -> usize {
        self.kinds.len()
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl std::fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLocks").field("stripes", &self.stripes()).finish()
    }
}

fn stripe<'a, K: Hash + ?Sized>(stripes: &'a [RwLock<()>], key: &K) -> &'a RwLock<()> {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    &stripes[(hasher.finish() % stripes.len() as u64) as usize]
}

/// Proof that the holder has exclusive access to a template kind.
#[must_use = "the lock is released when the guard is dropped"]
pub struct TemplateGuard<'a> {
    kind: TemplateKind,
    _kind: RwLockWriteGuard<'a, ()>,
}

impl TemplateGuard<'_> {
    /// The locked kind.
    pub fn kind(&self) -> &TemplateKind {
        &self.kind
    }
}

impl std::fmt::Debug for TemplateGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateGuard").field("kind", &self.kind).finish()
    }
}

/// Proof that the holder has exclusive access to a constraint key.
#[must_use = "the lock is released when the guard is dropped"]
pub struct ConstraintGuard<'a> {
    key: ConstraintKey,
    // Field order: the key stripe is released before the kind stripe.
    _constraint: RwLockWriteGuard<'a, ()>,
    _kind: RwLockReadGuard<'a, ()>,
}

impl ConstraintGuard<'_> {
    /// The locked constraint key.
    pub fn key(&self) -> &ConstraintKey {
        &self.key
    }
}

impl std::fmt::Debug for ConstraintGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintGuard").field("key", &self.key).finish()
    }
}

/// Proof that the holder has exclusive access to every key.
#[must_use = "the lock is released when the guard is dropped"]
pub struct AllKeysGuard<'a> {
    _kinds: Vec<RwLockWriteGuard<'a, ()>>,
}

impl std::fmt::Debug for AllKeysGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllKeysGuard").finish_non_exhaustive()
    }
}
