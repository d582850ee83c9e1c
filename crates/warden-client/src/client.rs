//! # Client
//!
//! The single entry point for callers. Owns the compiler, the policy store,
//! and the cache, and coordinates them so that:
//!
//! - a failed mutation leaves both store and cache untouched;
//! - a template's modules and its cache record change together, in one
//!   short critical section (the commit lock, write side);
//! - a review reads the cache and the store under the same critical section
//!   (read side), so it never sees new modules with an old template record
//!   or the reverse.
//!
//! Compilation and module parsing happen before the commit lock is taken.
//! Lock order is always key lock, then commit lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};
use warden_cache::{Cache, CacheConfig, ConstraintStatus};
use warden_compiler::{CompiledTemplate, TemplateCompiler};
use warden_core::{
    Constraint, ConstraintKey, ConstraintName, Removal, ReviewError, ReviewResult, TargetName,
    Template, TemplateKind, WardenError,
};
use warden_driver::PolicyStore;
use warden_target::TargetRegistry;

use crate::config::ClientConfig;
use crate::review::{review_target, ReviewOptions};

// ---------------------------------------------------------------------------
// Template status
// ---------------------------------------------------------------------------

/// What [`Client::add_template`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateChange {
    /// The template was installed; `replaced` if a different version of the
    /// kind was cached before.
    Installed {
        /// Whether a previous version was replaced.
        replaced: bool,
    },
    /// An identical template was already cached; nothing changed.
    Unchanged,
}

/// Outcome of [`Client::add_template`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateStatus {
    /// The template kind.
    pub kind: TemplateKind,
    /// Installed or unchanged.
    pub change: TemplateChange,
    /// Targets the template did not compile for, with the reason. Reviews
    /// report an error for these targets.
    pub failures: BTreeMap<TargetName, String>,
}

impl TemplateStatus {
    fn new(compiled: &CompiledTemplate, change: TemplateChange) -> Self {
        Self {
            kind: compiled.kind().clone(),
            change,
            failures: compiled
                .failures
                .iter()
                .map(|f| (f.target.clone(), f.error.to_string()))
                .collect(),
        }
    }

    /// Whether the call changed anything.
    pub fn is_changed(&self) -> bool {
        self.change != TemplateChange::Unchanged
    }

    /// Whether some declared target failed to compile.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Policy engine client. `Send + Sync`; share it behind an `Arc`.
pub struct Client {
    config: ClientConfig,
    compiler: TemplateCompiler,
    store: PolicyStore,
    cache: Cache,
    commit: RwLock<()>,
}

impl Client {
    /// Create a client over a frozen target registry.
    pub fn new(registry: Arc<TargetRegistry>, config: ClientConfig) -> Self {
        let compiler = TemplateCompiler::new(registry).with_policy(config.compile_policy);
        let cache = Cache::new(CacheConfig::default().with_orphan_policy(config.orphan_policy));
        let store = PolicyStore::with_max_evaluations(config.max_evaluations);
        tracing::info!(
            targets = compiler.targets().len(),
            compile_policy = ?config.compile_policy,
            orphan_policy = ?config.orphan_policy,
            max_evaluations = config.max_evaluations,
            "client created"
        );
        Self {
            config,
            compiler,
            store,
            cache,
            commit: RwLock::new(()),
        }
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The target registry.
    pub fn targets(&self) -> &Arc<TargetRegistry> {
        self.compiler.targets()
    }

    // -- Templates ----------------------------------------------------------

    /// Compile and install a template, replacing any previous version of its
    /// kind atomically.
    ///
    /// # Errors
    ///
    /// Any compile error ([`WardenError::SchemaValidation`],
    /// [`WardenError::UnknownTarget`], [`WardenError::RuleSyntax`],
    /// [`WardenError::MissingEntryPoint`], [`WardenError::TemplateRejected`])
    /// or a [`WardenError::Compile`] from the store. Nothing changes on error.
    pub fn add_template(&self, template: &Template) -> Result<TemplateStatus, WardenError> {
        if let Some(current) = self.cache.template(&template.kind) {
            if current.template == *template {
                return Ok(TemplateStatus::new(&current, TemplateChange::Unchanged));
            }
        }

        let compiled = self.compiler.compile(template)?;

        let guard = self.cache.lock_template(&template.kind);
        let previous = self.cache.template(&template.kind);
        if let Some(current) = &previous {
            if current.template == *template {
                return Ok(TemplateStatus::new(current, TemplateChange::Unchanged));
            }
        }
        let prepared = self.store.prepare(compiled.module_change(previous.as_deref()))?;
        let status = TemplateStatus::new(
            &compiled,
            TemplateChange::Installed {
                replaced: previous.is_some(),
            },
        );

        {
            let _commit = self.commit.write();
            self.store.commit(prepared);
            self.cache.install_template(&guard, compiled);
        }
        Ok(status)
    }

    /// Remove a template, its modules, and (per the orphan policy) its
    /// constraints. Idempotent.
    ///
    /// # Errors
    ///
    /// [`WardenError::Compile`] if the store refuses the removal batch.
    pub fn remove_template(&self, kind: &TemplateKind) -> Result<Removal, WardenError> {
        let guard = self.cache.lock_template(kind);
        let Some(current) = self.cache.template(kind) else {
            return Ok(Removal::NotFound);
        };
        let prepared = self.store.prepare(current.removal())?;

        let _commit = self.commit.write();
        self.store.commit(prepared);
        Ok(self.cache.remove_template(&guard))
    }

    /// Compile a template without installing it.
    ///
    /// # Errors
    ///
    /// As [`Client::add_template`].
    pub fn validate_template(&self, template: &Template) -> Result<CompiledTemplate, WardenError> {
        self.compiler.compile(template)
    }

    /// The installed template of a kind.
    pub fn get_template(&self, kind: &TemplateKind) -> Option<Template> {
        self.cache.template(kind).map(|compiled| compiled.template.clone())
    }

    /// Every installed template kind, in order.
    pub fn list_templates(&self) -> Vec<TemplateKind> {
        self.cache.templates().iter().map(|t| t.kind().clone()).collect()
    }

    /// The derived constraint schema of a kind, as OpenAPI v3 JSON.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownTemplate`] if the kind is not installed.
    pub fn constraint_schema(&self, kind: &TemplateKind) -> Result<Value, WardenError> {
        self.cache
            .template(kind)
            .map(|compiled| compiled.schema.to_openapi())
            .ok_or_else(|| WardenError::UnknownTemplate(kind.to_string()))
    }

    // -- Constraints --------------------------------------------------------

    /// Add or replace a constraint.
    ///
    /// # Errors
    ///
    /// [`WardenError::UnknownTemplate`] if its template is not installed;
    /// [`WardenError::SchemaValidation`] if its parameters or match spec do
    /// not satisfy the template's derived schema.
    pub fn add_constraint(&self, constraint: Constraint) -> Result<(), WardenError> {
        self.cache.upsert_constraint(constraint).map(|_| ())
    }

    /// Remove a constraint. Idempotent.
    pub fn remove_constraint(
        &self,
        kind: &TemplateKind,
        name: &ConstraintName,
    ) -> Result<Removal, WardenError> {
        let key = ConstraintKey::new(kind.clone(), name.clone());
        Ok(self.cache.remove_constraint(&key))
    }

    /// Check a constraint without adding it.
    ///
    /// # Errors
    ///
    /// As [`Client::add_constraint`].
    pub fn validate_constraint(&self, constraint: &Constraint) -> Result<(), WardenError> {
        self.cache.check_constraint(constraint)
    }

    /// A stored constraint, orphaned or not.
    pub fn get_constraint(&self, kind: &TemplateKind, name: &ConstraintName) -> Option<Constraint> {
        let key = ConstraintKey::new(kind.clone(), name.clone());
        self.cache.constraint(&key).map(|entry| entry.constraint.as_ref().clone())
    }

    /// Every stored constraint key, in add order.
    pub fn list_constraints(&self) -> Vec<ConstraintKey> {
        self.cache
            .constraints()
            .iter()
            .map(|entry| entry.constraint.key())
            .collect()
    }

    // -- External data ------------------------------------------------------

    /// Offer an object to every target's data handling. Returns the number of
    /// targets that stored it.
    pub fn add_data(&self, object: &Value) -> usize {
        let mut stored = 0;
        for handler in self.targets().iter() {
            if let Some(entry) = handler.process_data(object) {
                self.store.put_data(handler.name(), &entry.path, entry.value);
                tracing::debug!(target_name = %handler.name(), path = ?entry.path, "data stored");
                stored += 1;
            }
        }
        stored
    }

    /// Remove an object previously added with [`Client::add_data`]. Returns
    /// the number of targets that held it.
    pub fn remove_data(&self, object: &Value) -> usize {
        self.targets()
            .iter()
            .filter_map(|handler| handler.process_data(object).map(|entry| (handler, entry)))
            .filter(|(handler, entry)| self.store.remove_data(handler.name(), &entry.path))
            .count()
    }

    // -- Review -------------------------------------------------------------

    /// Review an object with the configured timeout.
    ///
    /// # Errors
    ///
    /// [`WardenError::Evaluation`] if every target that handled the object
    /// failed. Partial failures are reported in [`ReviewResult::errors`].
    pub async fn review(&self, object: &Value) -> Result<ReviewResult, WardenError> {
        self.review_with(object, ReviewOptions::default()).await
    }

    /// Review an object with per-call options.
    ///
    /// # Errors
    ///
    /// As [`Client::review`].
    pub async fn review_with(
        &self,
        object: &Value,
        options: ReviewOptions,
    ) -> Result<ReviewResult, WardenError> {
        let (cache, store) = {
            let _commit = self.commit.read();
            (self.cache.snapshot(), self.store.snapshot())
        };
        let timeout = options.timeout.unwrap_or(self.config.query_timeout);

        let mut result = ReviewResult::default();
        let mut handled = 0usize;
        let mut failures: Vec<(TargetName, WardenError)> = Vec::new();

        for handler in self.targets().iter() {
            let Some(input) = handler.to_evaluator_input(object) else {
                continue;
            };
            handled += 1;
            match review_target(handler.as_ref(), &cache, &store, &input, timeout).await {
                Ok(outcome) => {
                    result.violations.extend(outcome.violations);
                    result.errors.extend(outcome.errors);
                }
                Err(err) => {
                    tracing::warn!(target_name = %handler.name(), error = %err, "target review failed");
                    result.errors.push(ReviewError {
                        target: handler.name().clone(),
                        kind: None,
                        message: err.to_string(),
                    });
                    failures.push((handler.name().clone(), err));
                }
            }
        }

        if !failures.is_empty() && failures.len() == handled {
            if failures.len() == 1 {
                let (_, err) = failures.remove(0);
                return Err(err);
            }
            return Err(WardenError::Evaluation {
                target: join(failures.iter().map(|(t, _)| t.to_string())),
                reason: join(failures.iter().map(|(t, e)| format!("{t}: {e}"))),
            });
        }

        tracing::debug!(
            targets = handled,
            violations = result.violations.len(),
            errors = result.errors.len(),
            "review complete"
        );
        Ok(result)
    }

    // -- Maintenance --------------------------------------------------------

    /// Drop every template, constraint, module, and external datum.
    pub fn reset(&self) {
        let all = self.cache.lock_all();
        let _commit = self.commit.write();
        self.store.clear();
        self.cache.clear(&all);
    }

    /// JSON summary of the client's state: templates (with per-target
    /// status), constraints, and registered modules.
    pub fn dump(&self) -> Value {
        let (cache, store) = {
            let _commit = self.commit.read();
            (self.cache.snapshot(), self.store.snapshot())
        };

        let templates: Vec<Value> = cache
            .templates()
            .map(|compiled| {
                let targets: BTreeMap<String, Value> = compiled
                    .artifacts
                    .iter()
                    .map(|(target, artifact)| {
                        (target.to_string(), json!({"module": artifact.module}))
                    })
                    .chain(compiled.failures.iter().map(|failure| {
                        (failure.target.to_string(), json!({"error": failure.error.to_string()}))
                    }))
                    .collect();
                json!({"kind": compiled.kind(), "targets": targets})
            })
            .collect();

        let constraints: Vec<Value> = cache
            .constraints()
            .map(|entry| {
                let status = match entry.status {
                    ConstraintStatus::Active => "active",
                    ConstraintStatus::Orphaned => "orphaned",
                };
                json!({
                    "kind": entry.constraint.kind,
                    "name": entry.constraint.name,
                    "enforcementAction": entry.constraint.enforcement_action,
                    "status": status,
                })
            })
            .collect();

        json!({
            "templates": templates,
            "constraints": constraints,
            "modules": store.modules().collect::<Vec<_>>(),
        })
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("targets", self.compiler.targets())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
