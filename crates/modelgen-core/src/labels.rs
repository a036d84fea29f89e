//! Nested label trees.
//!
//! Image labels arrive as a flat map with dot-separated keys
//! (`gen.v1.model.v2.CREATED`). Generation parameters and metadata are read
//! from the nested form, e.g.
//!
//! ```text
//! {"a.x": "AX", "a.y": "AY"}  ->  {"a": {"x": "AX", "y": "AY"}}
//! ```
//!
//! When keys disagree about whether a path is a value or a subtree, the value
//! is moved under [`CONFLICT_KEY`] inside the subtree:
//!
//! ```text
//! {"a": "A", "a.b": "AB"}     ->  {"a": {"_value": "A", "b": "AB"}}
//! ```
//!
//! Nothing is overwritten. A value whose conflict slot already holds a
//! scalar is collected with it into an array, first value first.

use serde_json::map::Entry;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::CoreError;

/// Key under which conflicting values are stored.
pub const CONFLICT_KEY: &str = "_value";

/// A decoded label tree.
pub type LabelTree = Map<String, Value>;

/// A key collision found while decoding labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelConflict {
    /// The flat key being decoded when the collision was found.
    pub key: String,

    /// The value that had to be relocated or could not be placed.
    pub value: Value,

    /// Where the value now lives.
    pub moved_to: String,
}

/// Decode flat labels using the default conflict key.
///
/// Conflicts are logged at warn level and otherwise ignored.
pub fn decode_labels<I, K, V>(flat: I) -> LabelTree
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    decode_labels_with(flat, CONFLICT_KEY).0
}

/// Decode flat labels into a tree, returning every conflict encountered.
///
/// Keys are processed in sorted order so the result does not depend on the
/// iteration order of the input map. Decoding never fails.
pub fn decode_labels_with<I, K, V>(flat: I, conflict_key: &str) -> (LabelTree, Vec<LabelConflict>)
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut entries: Vec<(String, Value)> = flat
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut tree = LabelTree::new();
    let mut conflicts = Vec::new();

    for (key, value) in entries {
        insert_label(&mut tree, &key, value, conflict_key, &mut conflicts);
    }

    (tree, conflicts)
}

fn insert_label(
    tree: &mut LabelTree,
    key: &str,
    value: Value,
    conflict_key: &str,
    conflicts: &mut Vec<LabelConflict>,
) {
    let mut segments: Vec<&str> = key.split('.').map(str::trim).collect();
    // split always yields at least one segment
    let last = segments.pop().unwrap_or_default();

    let mut node = tree;
    for segment in segments {
        let slot = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        if !slot.is_object() {
            let previous = slot.take();
            report(
                conflicts,
                key,
                previous.clone(),
                format!("<...>.{}.{}", segment, conflict_key),
            );
            let mut wrapped = Map::new();
            wrapped.insert(conflict_key.to_string(), previous);
            *slot = Value::Object(wrapped);
        }

        node = match slot.as_object_mut() {
            Some(map) => map,
            None => unreachable!("slot holds an object after relocation"),
        };
    }

    let Some(existing) = node.get_mut(last) else {
        node.insert(last.to_string(), value);
        return;
    };

    let path = key.split('.').map(str::trim).collect::<Vec<_>>().join(".");
    let moved_to = place_conflicting(existing, value.clone(), conflict_key, path);
    report(conflicts, key, value, moved_to);
}

/// Store a value whose position is taken, following the chain of conflict
/// keys. A value meeting a scalar is collected into an array after it.
fn place_conflicting(mut slot: &mut Value, value: Value, conflict_key: &str, mut location: String) -> String {
    loop {
        slot = match slot {
            Value::Object(map) => {
                location.push('.');
                location.push_str(conflict_key);
                match map.entry(conflict_key.to_string()) {
                    Entry::Vacant(entry) => {
                        entry.insert(value);
                        return location;
                    }
                    Entry::Occupied(entry) => entry.into_mut(),
                }
            }
            Value::Array(values) => {
                values.push(value);
                return location;
            }
            other => {
                let previous = other.take();
                *other = Value::Array(vec![previous, value]);
                return location;
            }
        };
    }
}

fn report(conflicts: &mut Vec<LabelConflict>, key: &str, value: Value, moved_to: String) {
    warn!(
        key = %key,
        value = %value,
        moved_to = %moved_to,
        "Label key conflicts with a previous key, value relocated"
    );
    conflicts.push(LabelConflict {
        key: key.to_string(),
        value,
        moved_to,
    });
}

/// Look up a value by nested path.
///
/// Returns `Ok(None)` as soon as a segment is missing or an intermediate
/// node is not a subtree.
pub fn lookup<'a>(tree: &'a LabelTree, path: &[&str]) -> Result<Option<&'a Value>, CoreError> {
    let Some((last, parents)) = path.split_last() else {
        return Err(CoreError::InvalidPath);
    };

    let mut node = tree;
    for segment in parents {
        match node.get(*segment) {
            Some(Value::Object(map)) => node = map,
            _ => return Ok(None),
        }
    }

    Ok(node.get(*last))
}

/// Extract the subtree at `path`, or an empty tree if it does not exist.
///
/// Missing metadata is expected; only an empty path is an error.
pub fn extract(tree: &LabelTree, path: &[&str]) -> Result<LabelTree, CoreError> {
    Ok(match lookup(tree, path)? {
        Some(Value::Object(map)) => map.clone(),
        _ => LabelTree::new(),
    })
}
