//! # Cache Snapshot
//!
//! An immutable view of every cached template and constraint. Snapshots are
//! cheap to clone (`Arc`-shared records) and are what reviews read from.
//!
//! Alongside the two namespaces the snapshot keeps a per-target index of
//! the constraints a review of that target must consider, keyed by add
//! sequence. A constraint is indexed under a target when it is active, its
//! template declares the target, and its match spec applies there. Every
//! mutation below keeps the index in step.

use std::collections::BTreeMap;
use std::sync::Arc;

use warden_compiler::CompiledTemplate;
use warden_core::{Constraint, ConstraintKey, TargetFailure, TargetName, TemplateKind};
use warden_driver::ModuleId;

/// Whether a constraint takes part in reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStatus {
    /// Its template is cached.
    Active,
    /// Its template was removed under the retain policy.
    Orphaned,
}

/// A cached constraint.
#[derive(Debug, Clone)]
pub struct ConstraintEntry {
    /// The constraint as added.
    pub constraint: Arc<Constraint>,
    /// Add sequence; preserved across replacement.
    pub seq: u64,
    /// Active or orphaned.
    pub status: ConstraintStatus,
}

impl ConstraintEntry {
    /// Whether the constraint takes part in reviews.
    pub fn is_active(&self) -> bool {
        self.status == ConstraintStatus::Active
    }
}

/// A constraint to evaluate against one target, with its compiled module or
/// the reason its template has none for that target.
#[derive(Debug, Clone, Copy)]
pub struct TargetConstraint<'a> {
    /// The constraint.
    pub constraint: &'a Constraint,
    /// The compiled main module, or the target's compile failure.
    pub artifact: Result<&'a ModuleId, &'a TargetFailure>,
}

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    templates: BTreeMap<TemplateKind, Arc<CompiledTemplate>>,
    constraints: BTreeMap<ConstraintKey, ConstraintEntry>,
    order: BTreeMap<u64, ConstraintKey>,
    by_target: BTreeMap<TargetName, BTreeMap<u64, ConstraintKey>>,
    next_seq: u64,
    generation: u64,
}

impl CacheSnapshot {
    /// Incremented by every committed change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The compiled template of a kind.
    pub fn template(&self, kind: &TemplateKind) -> Option<&Arc<CompiledTemplate>> {
        self.templates.get(kind)
    }

    /// All templates, ordered by kind.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<CompiledTemplate>> {
        self.templates.values()
    }

    /// A constraint entry, active or orphaned.
    pub fn constraint(&self, key: &ConstraintKey) -> Option<&ConstraintEntry> {
        self.constraints.get(key)
    }

    /// All constraint entries, in add order.
    pub fn constraints(&self) -> impl Iterator<Item = &ConstraintEntry> {
        self.order.values().filter_map(|key| self.constraints.get(key))
    }

    /// Constraint entries of one kind, in add order.
    pub fn constraints_of<'a>(
        &'a self,
        kind: &'a TemplateKind,
    ) -> impl Iterator<Item = &'a ConstraintEntry> + 'a {
        self.constraints().filter(move |entry| &entry.constraint.kind == kind)
    }

    /// Active constraints whose template declares `target` and whose match
    /// spec applies to it, in add order.
    pub fn constraints_for_target(&self, target: &TargetName) -> Vec<TargetConstraint<'_>> {
        let Some(index) = self.by_target.get(target) else {
            return Vec::new();
        };
        index
            .values()
            .filter_map(|key| {
                let entry = self.constraints.get(key)?;
                let template = self.templates.get(&entry.constraint.kind)?;
                let artifact = match template.artifact(target) {
                    Some(artifact) => Ok(&artifact.module),
                    None => Err(template.failure(target)?),
                };
                Some(TargetConstraint {
                    constraint: entry.constraint.as_ref(),
                    artifact,
                })
            })
            .collect()
    }

    /// Number of templates.
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// Number of constraints, orphans included.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of orphaned constraints.
    pub fn orphan_count(&self) -> usize {
        self.constraints.values().filter(|e| !e.is_active()).count()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.constraints.is_empty()
    }

    // ------------------------------------------------------------------
    // Mutation (crate-internal; callers go through `Cache`)
    // ------------------------------------------------------------------

    pub(crate) fn bump(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn insert_template(
        &mut self,
        compiled: Arc<CompiledTemplate>,
    ) -> Option<Arc<CompiledTemplate>> {
        let kind = compiled.kind().clone();
        let previous = self.templates.insert(kind.clone(), compiled);
        self.reindex_kind(&kind);
        previous
    }

    pub(crate) fn remove_template(&mut self, kind: &TemplateKind) -> Option<Arc<CompiledTemplate>> {
        let removed = self.templates.remove(kind);
        if removed.is_some() {
            self.reindex_kind(kind);
        }
        removed
    }

    /// Insert or replace a constraint. Returns `true` if it replaced one.
    pub(crate) fn upsert_constraint(&mut self, constraint: Constraint) -> bool {
        let key = constraint.key();
        let constraint = Arc::new(constraint);
        let replaced = match self.constraints.get_mut(&key) {
            Some(entry) => {
                entry.constraint = constraint;
                entry.status = ConstraintStatus::Active;
                true
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.order.insert(seq, key.clone());
                self.constraints.insert(
                    key.clone(),
                    ConstraintEntry {
                        constraint,
                        seq,
                        status: ConstraintStatus::Active,
                    },
                );
                false
            }
        };
        self.reindex(&key);
        replaced
    }

    pub(crate) fn remove_constraint(&mut self, key: &ConstraintKey) -> bool {
        match self.constraints.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                self.unindex(entry.seq);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_status(&mut self, key: &ConstraintKey, status: ConstraintStatus) {
        if let Some(entry) = self.constraints.get_mut(key) {
            entry.status = status;
            self.reindex(key);
        }
    }

    /// Keys of every constraint of `kind`.
    pub(crate) fn keys_of(&self, kind: &TemplateKind) -> Vec<ConstraintKey> {
        self.constraints
            .keys()
            .filter(|key| &key.kind == kind)
            .cloned()
            .collect()
    }

    /// Drop every record; the add sequence keeps counting.
    pub(crate) fn clear(&mut self) {
        self.templates.clear();
        self.constraints.clear();
        self.order.clear();
        self.by_target.clear();
    }

    // ------------------------------------------------------------------
    // Target index
    // ------------------------------------------------------------------

    fn reindex_kind(&mut self, kind: &TemplateKind) {
        for key in self.keys_of(kind) {
            self.reindex(&key);
        }
    }

    /// Recompute the index entries of one constraint.
    fn reindex(&mut self, key: &ConstraintKey) {
        let Some(entry) = self.constraints.get(key) else {
            return;
        };
        let seq = entry.seq;
        let targets: Vec<TargetName> = match self.templates.get(&entry.constraint.kind) {
            Some(template) if entry.is_active() => {
                let spec = entry.constraint.match_spec.as_ref();
                template
                    .artifacts
                    .keys()
                    .chain(template.failures.iter().map(|f| &f.target))
                    .filter(|target| template.schema.match_applies(target, spec))
                    .cloned()
                    .collect()
            }
            _ => Vec::new(),
        };

        self.unindex(seq);
        for target in targets {
            self.by_target.entry(target).or_default().insert(seq, key.clone());
        }
    }

    fn unindex(&mut self, seq: u64) {
        self.by_target.retain(|_, index| {
            index.remove(&seq);
            !index.is_empty()
        });
    }
}
