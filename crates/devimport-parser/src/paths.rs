//! Dotted field-path helpers over JSON objects (`ids.device_id`,
//! `root_keys.app_key.key`).

use serde_json::{Map, Value};

/// Returns the value at `path`, descending through nested objects.
pub fn value_at<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = object.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Returns the string at `path` with surrounding whitespace removed, or `None`
/// when the value is absent, not a string, or blank.
pub fn non_empty_str_at<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a str> {
    value_at(object, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Writes `value` at `path`, creating intermediate objects. An intermediate
/// segment holding a non-object value is replaced.
pub fn set_value_at(object: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            object.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                set_value_at(child, rest, value);
            }
        }
    }
}

/// Flattens nested objects into the dotted paths of their leaves. Arrays,
/// scalars and empty objects are leaves.
pub fn leaf_paths(object: &Map<String, Value>) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaf_paths(object, "", &mut paths);
    paths
}

fn collect_leaf_paths(object: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(child) if !child.is_empty() => collect_leaf_paths(child, &path, out),
            _ => out.push(path),
        }
    }
}
