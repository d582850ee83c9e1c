//! # Policy Store
//!
//! Copy-on-write state behind a `parking_lot::RwLock<Arc<_>>`. Readers clone
//! the `Arc` and never block writers for longer than a pointer copy; writers
//! apply their change to the latest state and swap it in.
//!
//! Lock discipline: the write lock is held only while applying an already
//! validated change. It is never held across an `.await` or while the
//! evaluator runs.
//!
//! Evaluations run on the blocking pool and cannot be interrupted, so a
//! query that times out keeps its thread until the evaluator returns. A
//! store-wide semaphore caps how many evaluations occupy blocking threads at
//! once; its permit travels into the blocking task and is released only when
//! the evaluation actually ends. Waiting for a permit counts against the
//! query's timeout.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use warden_core::{ConstraintKey, TargetName};

use crate::data;
use crate::error::{describe, DriverError};
use crate::module::{ModuleChange, ModuleId};
use crate::rego::{check_syntax, find_package};

/// Default cap on evaluations running at once, per store.
pub const DEFAULT_MAX_EVALUATIONS: usize = 32;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct StoreState {
    modules: BTreeMap<ModuleId, String>,
    data: BTreeMap<TargetName, Value>,
    generation: u64,
}

impl StoreState {
    /// Apply a validated change. Returns the number of modules removed.
    fn apply(&mut self, change: ModuleChange) -> usize {
        let before = self.modules.len();
        for id in &change.remove {
            self.modules.retain(|existing, _| !id.covers(existing));
        }
        let removed = before - self.modules.len();
        for (id, source) in change.put {
            self.modules.insert(id, source);
        }
        self.generation += 1;
        removed
    }
}

/// A module change that parsed cleanly and may be committed.
///
/// Only [`PolicyStore::prepare`] creates one.
#[derive(Debug, Clone)]
pub struct PreparedChange {
    change: ModuleChange,
}

impl PreparedChange {
    /// The underlying change.
    pub fn change(&self) -> &ModuleChange {
        &self.change
    }
}

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    /// Store generation after the commit.
    pub generation: u64,
    /// Modules removed, including nested libraries.
    pub removed: usize,
}

// ---------------------------------------------------------------------------
// PolicyStore
// ---------------------------------------------------------------------------

/// Registered modules plus per-target external data.
#[derive(Debug)]
pub struct PolicyStore {
    state: RwLock<Arc<StoreState>>,
    evaluations: Arc<Semaphore>,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::with_max_evaluations(DEFAULT_MAX_EVALUATIONS)
    }
}

impl PolicyStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store running at most `max` evaluations at once (at least
    /// one).
    pub fn with_max_evaluations(max: usize) -> Self {
        Self {
            state: RwLock::new(Arc::new(StoreState::default())),
            evaluations: Arc::new(Semaphore::new(max.max(1))),
        }
    }

    /// Evaluation slots not currently taken.
    pub fn available_evaluations(&self) -> usize {
        self.evaluations.available_permits()
    }

    /// Validate a change without applying it.
    ///
    /// Every inserted source must declare exactly its module id as package
    /// and the sources must parse together.
    ///
    /// # Errors
    ///
    /// [`DriverError::Compile`] naming the first offending module.
    pub fn prepare(&self, change: ModuleChange) -> Result<PreparedChange, DriverError> {
        for (id, source) in &change.put {
            match find_package(source) {
                Some(decl) if decl.path == id.as_str() => {}
                Some(decl) => {
                    return Err(DriverError::Compile {
                        module: id.to_string(),
                        reason: format!("declares package {}, expected {id}", decl.path),
                    })
                }
                None => {
                    return Err(DriverError::Compile {
                        module: id.to_string(),
                        reason: "missing package declaration".to_string(),
                    })
                }
            }
        }

        let names: Vec<String> = change.put.iter().map(|(id, _)| format!("{id}.rego")).collect();
        check_syntax(
            names
                .iter()
                .zip(&change.put)
                .map(|(name, (_, source))| (name.as_str(), source.as_str())),
        )
        .map_err(|err| DriverError::Compile {
            module: err.path.trim_end_matches(".rego").to_string(),
            reason: err.reason,
        })?;

        Ok(PreparedChange { change })
    }

    /// Apply a prepared change in one swap.
    pub fn commit(&self, prepared: PreparedChange) -> Committed {
        let change = prepared.change;
        let (puts, removes) = (change.put.len(), change.remove.len());
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);
        let removed = state.apply(change);
        let generation = state.generation;
        drop(guard);
        tracing::debug!(generation, puts, removes, removed, "committed module change");
        Committed { generation, removed }
    }

    /// Register (or replace) a single module.
    pub fn put_module(&self, id: ModuleId, source: impl Into<String>) -> Result<(), DriverError> {
        let prepared = self.prepare(ModuleChange::new().put(id, source))?;
        self.commit(prepared);
        Ok(())
    }

    /// Remove a module and its nested libraries. Returns whether anything
    /// was removed.
    pub fn remove_module(&self, id: &ModuleId) -> bool {
        let change = ModuleChange::new().remove(id.clone());
        self.commit(PreparedChange { change }).removed > 0
    }

    /// Store external data for `target` at `path` beneath `data.inventory`.
    pub fn put_data(&self, target: &TargetName, path: &[String], value: Value) {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut *guard);
        let tree = state
            .data
            .entry(target.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        data::insert(tree, path, value);
        state.generation += 1;
    }

    /// Remove external data for `target` at `path`. Returns whether anything
    /// was removed.
    pub fn remove_data(&self, target: &TargetName, path: &[String]) -> bool {
        let mut guard = self.state.write();
        if !guard.data.contains_key(target) {
            return false;
        }
        let state = Arc::make_mut(&mut *guard);
        let removed = state
            .data
            .get_mut(target)
            .is_some_and(|tree| data::remove(tree, path));
        if removed {
            state.generation += 1;
        }
        removed
    }

    /// Drop every module and all external data.
    pub fn clear(&self) {
        let mut guard = self.state.write();
        let generation = guard.generation + 1;
        *guard = Arc::new(StoreState {
            generation,
            ..StoreState::default()
        });
    }

    /// A consistent, immutable view of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            state: self.state.read().clone(),
            evaluations: Arc::clone(&self.evaluations),
        }
    }

    /// Shorthand for `self.snapshot().query(...)`.
    pub async fn query(
        &self,
        target: &TargetName,
        entry_point: &str,
        review: &Value,
        constraints: Vec<QueryConstraint>,
        timeout: Duration,
    ) -> Result<Vec<RawResult>, DriverError> {
        self.snapshot()
            .query(target, entry_point, review, constraints, timeout)
            .await
    }
}

// ---------------------------------------------------------------------------
// Snapshot and queries
// ---------------------------------------------------------------------------

/// One constraint to evaluate in a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConstraint {
    /// The constraint, used to tag its results.
    pub key: ConstraintKey,
    /// The compiled module of the constraint's template for this target.
    pub module: ModuleId,
    /// The constraint's parameters, exposed as `input.parameters`.
    pub parameters: Value,
}

/// One value bound by the entry point rule, tagged with its constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    /// The constraint whose module produced the value.
    pub constraint: ConstraintKey,
    /// The raw value, typically `{"msg": ..., "details": ...}`.
    pub value: Value,
}

/// Immutable view of the store at one generation.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    state: Arc<StoreState>,
    evaluations: Arc<Semaphore>,
}

impl StoreSnapshot {
    /// Generation counter; increases with every change.
    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Whether the module is registered.
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.state.modules.contains_key(id)
    }

    /// Registered module ids, sorted.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.state.modules.keys()
    }

    /// Source of a registered module.
    pub fn source(&self, id: &ModuleId) -> Option<&str> {
        self.state.modules.get(id).map(String::as_str)
    }

    /// The external data tree of a target.
    pub fn data(&self, target: &TargetName) -> Option<&Value> {
        self.state.data.get(target)
    }

    /// Evaluate `entry_point` of each constraint's module against `review`.
    ///
    /// Results come back grouped by constraint in request order; within a
    /// constraint, in the evaluator's (deterministic) order.
    ///
    /// # Errors
    ///
    /// - [`DriverError::UnknownModule`] before any evaluation, if a module is
    ///   not registered.
    /// - [`DriverError::Evaluation`] if the evaluator fails or panics.
    /// - [`DriverError::Timeout`] if waiting for an evaluation slot plus
    ///   evaluating exceeds `timeout`. The evaluation itself cannot be
    ///   interrupted; it finishes on the blocking pool, holding its slot, and
    ///   its result is discarded.
    pub async fn query(
        &self,
        target: &TargetName,
        entry_point: &str,
        review: &Value,
        constraints: Vec<QueryConstraint>,
        timeout: Duration,
    ) -> Result<Vec<RawResult>, DriverError> {
        if let Some(missing) = constraints.iter().find(|c| !self.contains(&c.module)) {
            return Err(DriverError::UnknownModule(missing.module.to_string()));
        }
        if constraints.is_empty() {
            return Ok(Vec::new());
        }

        let job = QueryJob {
            target: target.clone(),
            entry_point: entry_point.to_string(),
            modules: self.modules_for(&constraints),
            data: self
                .data(target)
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            review: review.clone(),
            constraints,
        };
        tracing::debug!(
            target_name = %target,
            modules = job.modules.len(),
            constraints = job.constraints.len(),
            "evaluating query"
        );

        let evaluations = Arc::clone(&self.evaluations);
        let name = target.to_string();
        let run = async move {
            let Ok(permit) = evaluations.acquire_owned().await else {
                return Err(DriverError::Evaluation {
                    target: name,
                    reason: "evaluation limiter closed".to_string(),
                });
            };
            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job.run()
            });
            match task.await {
                Ok(result) => result,
                Err(join) => Err(DriverError::Evaluation {
                    target: name,
                    reason: format!("evaluation task failed: {join}"),
                }),
            }
        };
        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout {
                target: target.to_string(),
                after: timeout,
            }),
        }
    }

    /// The requested modules plus everything nested beneath them.
    fn modules_for(&self, constraints: &[QueryConstraint]) -> Vec<(ModuleId, String)> {
        let mut roots: Vec<&ModuleId> = constraints.iter().map(|c| &c.module).collect();
        roots.sort_unstable();
        roots.dedup();
        self.state
            .modules
            .iter()
            .filter(|(id, _)| roots.iter().any(|root| root.covers(id)))
            .map(|(id, source)| (id.clone(), source.clone()))
            .collect()
    }
}

/// Everything a blocking evaluation needs, owned.
struct QueryJob {
    target: TargetName,
    entry_point: String,
    modules: Vec<(ModuleId, String)>,
    data: Value,
    review: Value,
    constraints: Vec<QueryConstraint>,
}

impl QueryJob {
    fn run(self) -> Result<Vec<RawResult>, DriverError> {
        let mut engine = regorus::Engine::new();
        for (id, source) in &self.modules {
            engine
                .add_policy(format!("{id}.rego"), source.clone())
                .map_err(|err| DriverError::Compile {
                    module: id.to_string(),
                    reason: describe(&err),
                })?;
        }
        let inventory = self.to_engine_value(&json!({ "inventory": self.data }))?;
        engine
            .add_data(inventory)
            .map_err(|err| self.evaluation_error(&err))?;

        let mut results = Vec::new();
        for constraint in &self.constraints {
            let input = json!({
                "review": self.review,
                "parameters": constraint.parameters,
            });
            engine.set_input(self.to_engine_value(&input)?);

            let query = format!("data.{}.{}[result]", constraint.module, self.entry_point);
            let outcome = engine
                .eval_query(query, false)
                .map_err(|err| self.evaluation_error(&err))?;
            let outcome = serde_json::to_value(&outcome).map_err(|err| DriverError::Evaluation {
                target: self.target.to_string(),
                reason: format!("unreadable query result: {err}"),
            })?;

            for value in bound_results(&outcome) {
                results.push(RawResult {
                    constraint: constraint.key.clone(),
                    value,
                });
            }
        }
        Ok(results)
    }

    fn to_engine_value(&self, value: &Value) -> Result<regorus::Value, DriverError> {
        regorus::Value::from_json_str(&value.to_string()).map_err(|err| self.evaluation_error(&err))
    }

    fn evaluation_error(&self, err: &anyhow::Error) -> DriverError {
        DriverError::Evaluation {
            target: self.target.to_string(),
            reason: describe(err),
        }
    }
}

/// Extract the `result` binding of every row of a serialized query result.
fn bound_results(outcome: &Value) -> Vec<Value> {
    outcome
        .get("result")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get("bindings")?.get("result").cloned())
                .collect()
        })
        .unwrap_or_default()
}
