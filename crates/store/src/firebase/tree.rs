//! Local mirror of a subscribed location.
//!
//! Stream events address a path relative to the subscribed location. `put`
//! replaces the value there (`null` deletes it); `patch` replaces each named
//! child. Empty objects collapse to `null`, matching how the realtime
//! database never stores empty nodes.

use serde_json::{Map, Value};

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn normalize(data: Value) -> Value {
    match data {
        Value::Object(map) if map.is_empty() => Value::Null,
        other => other,
    }
}

fn set_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = normalize(data);
        return;
    };

    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    let Value::Object(map) = &mut *node else {
        return;
    };
    let child = map.entry((*head).to_string()).or_insert(Value::Null);
    set_at(child, rest, data);
    if child.is_null() {
        map.remove(*head);
    }
    let now_empty = map.is_empty();
    if now_empty {
        *node = Value::Null;
    }
}

/// Apply a `put` event.
pub fn apply_put(root: &mut Value, path: &str, data: Value) {
    set_at(root, &segments(path), data);
}

/// Apply a `patch` event. A non-object payload is treated as a put.
pub fn apply_patch(root: &mut Value, path: &str, data: Value) {
    let base = segments(path);
    match data {
        Value::Object(children) => {
            for (key, value) in children {
                let mut target = base.clone();
                target.push(key.as_str());
                set_at(root, &target, value);
            }
        }
        other => set_at(root, &base, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_at_root_replaces_everything() {
        let mut root = json!({"a": 1});
        apply_put(&mut root, "/", json!({"b": 2}));
        assert_eq!(root, json!({"b": 2}));
    }

    #[test]
    fn put_at_child_creates_intermediate_objects() {
        let mut root = Value::Null;
        apply_put(&mut root, "/2024-01-01_00:00:00/temperature", json!(21));
        assert_eq!(root, json!({"2024-01-01_00:00:00": {"temperature": 21}}));
    }

    #[test]
    fn put_null_deletes_and_prunes_empty_parents() {
        let mut root = json!({"a": {"b": 1}, "c": 2});
        apply_put(&mut root, "/a/b", Value::Null);
        assert_eq!(root, json!({"c": 2}));

        apply_put(&mut root, "/c", Value::Null);
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn deleting_missing_path_is_noop() {
        let mut root = json!({"a": 1});
        apply_put(&mut root, "/x/y", Value::Null);
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn patch_merges_children() {
        let mut root = json!({"tempHighThreshold": 30, "tempLowThreshold": 10});
        apply_patch(&mut root, "/", json!({"tempHighThreshold": 28, "humHighThreshold": 80}));
        assert_eq!(
            root,
            json!({"tempHighThreshold": 28, "tempLowThreshold": 10, "humHighThreshold": 80})
        );
    }

    #[test]
    fn patch_with_null_child_deletes_it() {
        let mut root = json!({"a": 1, "b": 2});
        apply_patch(&mut root, "/", json!({"a": null}));
        assert_eq!(root, json!({"b": 2}));
    }

    #[test]
    fn put_empty_object_is_null() {
        let mut root = json!({"a": 1});
        apply_put(&mut root, "/", json!({}));
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn put_below_scalar_replaces_it_with_object() {
        let mut root = json!({"a": 5});
        apply_put(&mut root, "/a/b", json!(1));
        assert_eq!(root, json!({"a": {"b": 1}}));
    }
}
