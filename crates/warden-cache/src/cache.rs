//! # Cache
//!
//! The mutable handle over [`CacheSnapshot`]. Every change is applied to
//! the latest snapshot with `Arc::make_mut` under a short
//! `parking_lot::RwLock` write and published by the swap. The state lock is
//! never held across an `.await` point and never while validating.
//!
//! Template mutations take a [`TemplateGuard`] from the caller so the
//! caller can keep the kind locked while it commits modules elsewhere.
//! Constraint mutations lock internally.

use std::sync::Arc;

use parking_lot::RwLock;
use warden_compiler::CompiledTemplate;
use warden_core::{Constraint, ConstraintKey, Removal, TemplateKind, WardenError};

use crate::config::{CacheConfig, OrphanPolicy};
use crate::locks::{AllKeysGuard, ConstraintGuard, KeyLocks, TemplateGuard, DEFAULT_STRIPES};
use crate::snapshot::{CacheSnapshot, ConstraintEntry, ConstraintStatus};

/// Outcome of [`Cache::install_template`].
#[derive(Debug)]
pub struct Installed {
    /// The template this one replaced, if any.
    pub previous: Option<Arc<CompiledTemplate>>,
    /// Orphaned constraints re-activated by this install.
    pub revived: usize,
}

/// Outcome of [`Cache::upsert_constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No constraint with this key existed.
    Created,
    /// An existing constraint was replaced; it keeps its add order.
    Replaced,
}

/// Template and constraint cache.
pub struct Cache {
    config: CacheConfig,
    locks: KeyLocks,
    state: RwLock<Arc<CacheSnapshot>>,
}

impl Cache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        let stripes = match config.lock_stripes {
            0 => DEFAULT_STRIPES,
            n => n,
        };
        Self {
            config,
            locks: KeyLocks::new(stripes),
            state: RwLock::new(Arc::new(CacheSnapshot::default())),
        }
    }

    /// The cache settings.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Lock one template kind for a mutation.
    pub fn lock_template(&self, kind: &TemplateKind) -> TemplateGuard<'_> {
        self.locks.lock_template(kind)
    }

    /// Lock every key, e.g. for [`Cache::clear`].
    pub fn lock_all(&self) -> AllKeysGuard<'_> {
        self.locks.lock_all()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.state.read().clone()
    }

    /// The compiled template of a kind.
    pub fn template(&self, kind: &TemplateKind) -> Option<Arc<CompiledTemplate>> {
        self.snapshot().template(kind).cloned()
    }

    /// A cached constraint.
    pub fn constraint(&self, key: &ConstraintKey) -> Option<ConstraintEntry> {
        self.snapshot().constraint(key).cloned()
    }

    /// All templates, ordered by kind.
    pub fn templates(&self) -> Vec<Arc<CompiledTemplate>> {
        self.snapshot().templates().cloned().collect()
    }

    /// All constraints, in add order.
    pub fn constraints(&self) -> Vec<ConstraintEntry> {
        self.snapshot().constraints().cloned().collect()
    }

    /// Number of templates.
    pub fn template_count(&self) -> usize {
        self.snapshot().template_count()
    }

    /// Number of constraints, orphans included.
    pub fn constraint_count(&self) -> usize {
        self.snapshot().constraint_count()
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// Install or replace the template of the guarded kind.
    ///
    /// Constraints already active for the kind stay active. Under
    /// [`OrphanPolicy::Retain`], orphans of the kind that satisfy the new
    /// schema are re-activated; the rest stay orphaned.
    pub fn install_template(&self, guard: &TemplateGuard<'_>, compiled: CompiledTemplate) -> Installed {
        debug_assert_eq!(guard.kind(), compiled.kind());
        let kind = compiled.kind().clone();
        let revive = self.revivable(&kind, &compiled);
        let compiled = Arc::new(compiled);

        let previous = self.update(|state| {
            for key in &revive {
                state.set_status(key, ConstraintStatus::Active);
            }
            state.insert_template(compiled)
        });

        tracing::info!(
            kind = %kind,
            replaced = previous.is_some(),
            revived = revive.len(),
            "template installed"
        );
        Installed {
            previous,
            revived: revive.len(),
        }
    }

    fn revivable(&self, kind: &TemplateKind, compiled: &CompiledTemplate) -> Vec<ConstraintKey> {
        let snapshot = self.snapshot();
        snapshot
            .constraints_of(kind)
            .filter(|entry| !entry.is_active())
            .filter_map(|entry| match compiled.schema.validate(&entry.constraint) {
                Ok(()) => Some(entry.constraint.key()),
                Err(err) => {
                    tracing::warn!(
                        constraint = %entry.constraint.key(),
                        error = %err,
                        "orphaned constraint does not satisfy the new template; still orphaned"
                    );
                    None
                }
            })
            .collect()
    }

    /// Remove the template of the guarded kind, cascading to or orphaning
    /// its constraints per the configured [`OrphanPolicy`].
    pub fn remove_template(&self, guard: &TemplateGuard<'_>) -> Removal {
        let kind = guard.kind();
        let policy = self.config.orphan_policy;

        let outcome = self.update(|state| {
            state.remove_template(kind)?;
            let dependents = state.keys_of(kind);
            for key in &dependents {
                match policy {
                    OrphanPolicy::Cascade => {
                        state.remove_constraint(key);
                    }
                    OrphanPolicy::Retain => state.set_status(key, ConstraintStatus::Orphaned),
                }
            }
            Some(dependents.len())
        });

        match outcome {
            Some(dependents) => {
                tracing::info!(kind = %kind, dependents, policy = ?policy, "template removed");
                Removal::Removed
            }
            None => Removal::NotFound,
        }
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// Add or replace a constraint.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownTemplate`] if its kind is not cached, and
    /// [`WardenError::SchemaValidation`] if its parameters or match spec
    /// fail the template's derived schema. The cache is unchanged on error.
    pub fn upsert_constraint(&self, constraint: Constraint) -> Result<Upsert, WardenError> {
        let key = constraint.key();
        let guard = self.locks.lock_constraint(&key);
        self.check(&guard, &constraint)?;

        let replaced = self.update(|state| state.upsert_constraint(constraint));
        let outcome = if replaced {
            Upsert::Replaced
        } else {
            Upsert::Created
        };
        tracing::info!(constraint = %key, outcome = ?outcome, "constraint stored");
        Ok(outcome)
    }

    /// Check a constraint against its cached template without storing it.
    ///
    /// # Errors
    ///
    /// As [`Cache::upsert_constraint`].
    pub fn check_constraint(&self, constraint: &Constraint) -> Result<(), WardenError> {
        let guard = self.locks.lock_constraint(&constraint.key());
        self.check(&guard, constraint)
    }

    // Holding the kind stripe shared keeps the template fixed while checking.
    fn check(&self, _guard: &ConstraintGuard<'_>, constraint: &Constraint) -> Result<(), WardenError> {
        let snapshot = self.snapshot();
        let template = snapshot
            .template(&constraint.kind)
            .ok_or_else(|| WardenError::UnknownTemplate(constraint.kind.to_string()))?;
        template.schema.validate(constraint)
    }

    /// Remove a constraint. Idempotent.
    pub fn remove_constraint(&self, key: &ConstraintKey) -> Removal {
        let _guard = self.locks.lock_constraint(key);
        let removed = self.update(|state| state.remove_constraint(key));
        if removed {
            tracing::info!(constraint = %key, "constraint removed");
        }
        Removal::from(removed)
    }

    /// Drop every template and constraint.
    pub fn clear(&self, _guard: &AllKeysGuard<'_>) {
        self.update(CacheSnapshot::clear);
        tracing::info!("cache cleared");
    }

    fn update<R>(&self, f: impl FnOnce(&mut CacheSnapshot) -> R) -> R {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);
        let out = f(state);
        state.bump();
        out
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Cache")
            .field("orphan_policy", &self.config.orphan_policy)
            .field("templates", &snapshot.template_count())
            .field("constraints", &snapshot.constraint_count())
            .field("generation", &snapshot.generation())
            .finish()
    }
}
