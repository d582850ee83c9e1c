//! # Target Handler Trait

use serde_json::Value;
use warden_core::TargetName;
use warden_schema::Schema;

/// An object destined for the external data tree of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEntry {
    /// Path segments beneath `data.inventory`.
    pub path: Vec<String>,
    /// The value stored at that path.
    pub value: Value,
}

/// Behaviour of one target domain.
///
/// Implementations must be cheap to call and side-effect free: the review
/// engine calls them on every review, from many tasks at once.
pub trait TargetHandler: Send + Sync {
    /// The target's unique name.
    fn name(&self) -> &TargetName;

    /// Schema of the constraint `match` block this target understands.
    ///
    /// Object nodes without an explicit unknown-field policy are resolved
    /// strictly by the compiler.
    fn match_schema(&self) -> Schema;

    /// Convert an object under review into the `review` the rules see.
    ///
    /// `None` means this target does not handle the object; the target is
    /// skipped for this review.
    fn to_evaluator_input(&self, object: &Value) -> Option<Value>;

    /// Whether a constraint with `match_spec` applies to `review` (the value
    /// returned by [`TargetHandler::to_evaluator_input`]). A missing match
    /// spec matches everything.
    fn matches(&self, match_spec: Option<&Value>, review: &Value) -> bool;

    /// Map an object onto a location in the target's external data tree.
    ///
    /// `None` means the target keeps no data for this object.
    fn process_data(&self, _object: &Value) -> Option<DataEntry> {
        None
    }
}

/// Read an array of strings from `spec[key]`. A missing key or a non-array
/// value yields `None`; non-string elements are skipped.
pub(crate) fn string_list<'a>(spec: &'a Value, key: &str) -> Option<Vec<&'a str>> {
    spec.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
}
