//! Tagged-value helpers for the world-state tree.
//!
//! The state tree is a [`serde_json::Value`]. Merging follows one policy
//! everywhere: objects recurse, everything else (arrays, scalars, null)
//! replaces the target outright. Keys only present in the target survive.

use serde_json::{Map, Value};

/// Merge `source` into `target` in place.
///
/// - `null` in the source overwrites the target value.
/// - Arrays overwrite; there is no element-wise merge or concatenation.
/// - Objects recurse when both sides are objects.
/// - Scalars overwrite.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            merge_maps(target_map, source_map);
        }
        (target, source) => {
            *target = source.clone();
        }
    }
}

fn merge_maps(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, source_value) in source {
        match target.get_mut(key) {
            Some(existing) if existing.is_object() && source_value.is_object() => {
                deep_merge(existing, source_value);
            }
            _ => {
                target.insert(key.clone(), source_value.clone());
            }
        }
    }
}

/// Return a new value that is `base` with `overlay` merged on top.
pub fn merged(base: &Value, overlay: &Value) -> Value {
    let mut out = base.clone();
    deep_merge(&mut out, overlay);
    out
}

/// Split a dot-path into its non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Walk `root` along `segments`, returning `None` as soon as a segment is absent.
///
/// Arrays may be indexed with numeric segments.
pub fn lookup<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Assign `value` at `segments`, creating intermediate objects as needed.
///
/// Any non-object node on the way is replaced by an empty object. An empty
/// segment list leaves the root untouched and returns `false`.
pub fn assign(root: &mut Value, segments: &[&str], value: Value) -> bool {
    let Some((leaf, parents)) = segments.split_last() else {
        return false;
    };

    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(leaf.to_string(), value);
    true
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}
