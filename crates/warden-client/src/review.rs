//! # Review Engine
//!
//! Evaluates one object against every target that accepts it. Per target:
//! shape the input, select matching constraints, report constraints whose
//! template has no module for the target, query the store, and decode each
//! raw result into a [`Violation`].

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde_json::Value;
use warden_cache::CacheSnapshot;
use warden_core::{
    ConstraintKey, EnforcementAction, ReviewError, TargetName, Violation, WardenError, ENTRY_POINT,
};
use warden_driver::{QueryConstraint, RawResult, StoreSnapshot};
use warden_target::TargetHandler;

/// Per-call review settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewOptions {
    /// Overrides the configured query timeout.
    pub timeout: Option<Duration>,
}

impl ReviewOptions {
    /// Use `timeout` for every target of this review.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What one target contributed to a review.
#[derive(Debug, Default)]
pub(crate) struct TargetReview {
    pub violations: Vec<Violation>,
    pub errors: Vec<ReviewError>,
}

/// Review `input` (already shaped by `handler`) against the target's
/// constraints.
///
/// Returns `Err` only when the target as a whole failed (unknown module,
/// engine fault, timeout). Problems scoped to one template or constraint
/// come back as [`ReviewError`]s.
pub(crate) async fn review_target(
    handler: &dyn TargetHandler,
    cache: &CacheSnapshot,
    store: &StoreSnapshot,
    input: &Value,
    timeout: Duration,
) -> Result<TargetReview, WardenError> {
    let target = handler.name();
    let mut outcome = TargetReview::default();
    let mut failed_kinds = BTreeSet::new();
    let mut queries = Vec::new();
    let mut actions: HashMap<ConstraintKey, EnforcementAction> = HashMap::new();

    for candidate in cache.constraints_for_target(target) {
        let constraint = candidate.constraint;
        if !handler.matches(constraint.match_spec.as_ref(), input) {
            continue;
        }
        match candidate.artifact {
            Ok(module) => {
                let key = constraint.key();
                actions.insert(key.clone(), constraint.enforcement_action.clone());
                queries.push(QueryConstraint {
                    key,
                    module: module.clone(),
                    parameters: constraint.parameters.clone(),
                });
            }
            Err(failure) => {
                if failed_kinds.insert(constraint.kind.clone()) {
                    outcome.errors.push(ReviewError {
                        target: target.clone(),
                        kind: Some(constraint.kind.clone()),
                        message: format!("template did not compile for this target: {}", failure.error),
                    });
                }
            }
        }
    }

    tracing::debug!(
        target_name = %target,
        constraints = queries.len(),
        uncompiled = failed_kinds.len(),
        "reviewing target"
    );
    if queries.is_empty() {
        return Ok(outcome);
    }

    let results = store
        .query(target, ENTRY_POINT, input, queries, timeout)
        .await?;

    for raw in results {
        let Some(action) = actions.get(&raw.constraint) else {
            continue;
        };
        match decode(&raw) {
            Ok((message, details)) => outcome.violations.push(Violation {
                constraint: raw.constraint,
                target: target.clone(),
                enforcement_action: action.clone(),
                message,
                details,
            }),
            Err(reason) => outcome.errors.push(undecodable(target, raw.constraint, &reason)),
        }
    }
    Ok(outcome)
}

fn undecodable(target: &TargetName, key: ConstraintKey, reason: &str) -> ReviewError {
    ReviewError {
        target: target.clone(),
        kind: Some(key.kind.clone()),
        message: format!("constraint {key}: {reason}"),
    }
}

/// Split a raw `violation` result into its message and details.
pub(crate) fn decode(raw: &RawResult) -> Result<(String, Value), String> {
    let Value::Object(fields) = &raw.value else {
        return Err(format!("violation result must be an object, got {}", type_of(&raw.value)));
    };
    let message = match fields.get("msg") {
        Some(Value::String(msg)) => msg.clone(),
        Some(other) => return Err(format!("violation `msg` must be a string, got {}", type_of(other))),
        None => return Err("violation result has no `msg`".to_string()),
    };
    let details = fields.get("details").cloned().unwrap_or(Value::Null);
    Ok((message, details))
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
