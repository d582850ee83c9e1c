//! # External Data Trees
//!
//! Each target owns a JSON tree exposed to its rules as `data.inventory`.

use serde_json::{Map, Value};

/// Store `value` at `path`, creating (or overwriting non-object)
/// intermediate nodes. An empty path replaces the whole tree.
pub fn insert(tree: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *tree = value;
        return;
    };
    let mut node = tree;
    for segment in parents {
        make_object(node);
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    make_object(node);
    if let Value::Object(map) = node {
        map.insert(last.clone(), value);
    }
}

/// Remove the value at `path`, pruning parents left empty. Returns whether
/// anything was removed. An empty path clears the tree.
pub fn remove(tree: &mut Value, path: &[String]) -> bool {
    match path.split_first() {
        None => {
            let had_data = !is_empty_tree(tree);
            *tree = Value::Object(Map::new());
            had_data
        }
        Some((head, [])) => tree
            .as_object_mut()
            .is_some_and(|map| map.remove(head).is_some()),
        Some((head, rest)) => {
            let Some(map) = tree.as_object_mut() else {
                return false;
            };
            let Some(child) = map.get_mut(head) else {
                return false;
            };
            let removed = remove(child, rest);
            if removed && is_empty_tree(child) {
                map.remove(head);
            }
            removed
        }
    }
}

fn make_object(node: &mut Value) {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
}

fn is_empty_tree(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}
