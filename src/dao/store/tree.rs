//! Path-addressed manipulation of JSON trees, shared by the store backends.

use serde_json::{Map, Value};

/// Iterate the non-empty segments of a `/`-separated path.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Clone of the subtree at `path` (`Null` when absent).
pub(crate) fn subtree(root: &Value, path: &str) -> Value {
    let mut node = root;
    for segment in segments(path) {
        match node.get(segment) {
            Some(child) => node = child,
            None => return Value::Null,
        }
    }
    node.clone()
}

/// Overwrite the subtree at `path`, pruning branches emptied by null writes.
pub(crate) fn write_subtree(root: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = segments(path).collect();
    write_at(root, &parts, value);
}

fn write_at(node: &mut Value, parts: &[&str], value: Value) {
    let Some((head, rest)) = parts.split_first() else {
        *node = value;
        return;
    };
    if value.is_null() && !node.is_object() {
        // Deleting below a leaf or an absent branch changes nothing.
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let mut emptied = false;
    if let Value::Object(map) = &mut *node {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        write_at(child, rest, value);
        if child.is_null() {
            map.remove(*head);
        }
        emptied = map.is_empty();
    }
    if emptied {
        *node = Value::Null;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_creates_intermediate_branches() {
        let mut root = Value::Null;
        write_subtree(&mut root, "tracks/p1/t1/order", json!(5));
        assert_eq!(root, json!({ "tracks": { "p1": { "t1": { "order": 5 } } } }));
    }

    #[test]
    fn null_write_prunes_emptied_branches() {
        let mut root = json!({ "votes": { "p1": { "t1": { "u1": true } } } });
        write_subtree(&mut root, "votes/p1/t1/u1", Value::Null);
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn subtree_of_missing_path_is_null() {
        let root = json!({ "tracks": {} });
        assert_eq!(subtree(&root, "tracks/p1/t1"), Value::Null);
    }
}
