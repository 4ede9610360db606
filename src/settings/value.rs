//! Path and value helpers shared by the settings store and facade.

use serde_json::{Map, Value};

use super::{SettingsError, SettingsResult};

/// Truthy strings accepted by boolean conversion.
const BOOLEAN_TRUES: [&str; 5] = ["true", "yes", "y", "1", "on"];

/// Convert a borrowed path into an owned one.
pub fn to_path(path: &[&str]) -> Vec<String> {
    path.iter().map(|segment| (*segment).to_string()).collect()
}

/// Dotted representation of a path, used in logs and errors.
pub fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

/// Find the value at `path` below `root`.
pub fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, segment| current.as_object()?.get(segment))
}

/// Store `value` at `path`, creating intermediate objects.
pub fn insert(root: &mut Value, path: &[String], value: Value) -> SettingsResult<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let map = current.as_object_mut().ok_or_else(|| SettingsError::NotAnObject {
            path: display_path(path),
            parent: display_path(&path[..depth]),
        })?;
        current = map.entry(segment.clone()).or_insert_with(|| Value::Object(Map::new()));
    }

    let map = current.as_object_mut().ok_or_else(|| SettingsError::NotAnObject {
        path: display_path(path),
        parent: display_path(parents),
    })?;
    map.insert(last.clone(), value);
    Ok(())
}

/// Remove the value at `path`, pruning parents left empty.
///
/// Returns whether something was removed.
pub fn remove(root: &mut Value, path: &[String]) -> bool {
    let Some((first, rest)) = path.split_first() else {
        let had_content = !matches!(root, Value::Object(map) if map.is_empty());
        *root = Value::Object(Map::new());
        return had_content;
    };

    let Some(map) = root.as_object_mut() else {
        return false;
    };

    if rest.is_empty() {
        return map.remove(first).is_some();
    }

    let Some(child) = map.get_mut(first) else {
        return false;
    };
    let removed = remove(child, rest);
    if removed && matches!(child, Value::Object(inner) if inner.is_empty()) {
        map.remove(first);
    }
    removed
}

/// Merge `overlay` into `base`; overlay leaves win, objects merge recursively.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Nest `value` under `prefix`.
pub fn wrap(prefix: &[String], value: Value) -> Value {
    prefix.iter().rev().fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.clone(), inner);
        Value::Object(map)
    })
}

/// Integer view of a value.
///
/// Floats are truncated, strings must hold an integer literal, booleans map
/// to 0/1. Anything else has no integer view.
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Float view of a value.
pub fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Boolean view of a value.
///
/// Strings are true only when they are one of the accepted truthy words.
pub fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(number) => number.as_f64().map(|f| f != 0.0),
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            Some(BOOLEAN_TRUES.contains(&lowered.as_str()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(segments: &[&str]) -> Vec<String> {
        to_path(segments)
    }

    #[test]
    fn test_lookup() {
        let root = json!({"plugins": {"foo": {"bar": 5}}});

        assert_eq!(lookup(&root, &path(&["plugins", "foo", "bar"])), Some(&json!(5)));
        assert_eq!(lookup(&root, &path(&[])), Some(&root));
        assert!(lookup(&root, &path(&["plugins", "foo", "bar", "deeper"])).is_none());
        assert!(lookup(&root, &path(&["missing"])).is_none());
    }

    #[test]
    fn test_insert_creates_parents() {
        let mut root = json!({});
        insert(&mut root, &path(&["plugins", "foo", "bar"]), json!(5)).unwrap();
        assert_eq!(root, json!({"plugins": {"foo": {"bar": 5}}}));
    }

    #[test]
    fn test_insert_through_leaf_fails() {
        let mut root = json!({"plugins": 3});
        let result = insert(&mut root, &path(&["plugins", "foo"]), json!(1));
        assert!(matches!(result, Err(SettingsError::NotAnObject { .. })));
    }

    #[test]
    fn test_remove_prunes_empty_parents() {
        let mut root = json!({"plugins": {"foo": {"bar": 5}}, "other": 1});

        assert!(remove(&mut root, &path(&["plugins", "foo", "bar"])));
        assert_eq!(root, json!({"other": 1}));
        assert!(!remove(&mut root, &path(&["plugins", "foo", "bar"])));
    }

    #[test]
    fn test_deep_merge() {
        let mut base = json!({"a": 1, "nested": {"x": 1, "y": 2}});
        deep_merge(&mut base, &json!({"b": 2, "nested": {"y": 3}}));
        assert_eq!(base, json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 3}}));

        let mut leaf = json!({"a": 1});
        deep_merge(&mut leaf, &json!(7));
        assert_eq!(leaf, json!(7));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(&path(&["plugins", "foo"]), json!({"x": 2})), json!({"plugins": {"foo": {"x": 2}}}));
        assert_eq!(wrap(&[], json!(1)), json!(1));
    }

    #[test]
    fn test_int_conversion() {
        assert_eq!(as_int(&json!(5)), Some(5));
        assert_eq!(as_int(&json!(5.9)), Some(5));
        assert_eq!(as_int(&json!(" 42 ")), Some(42));
        assert_eq!(as_int(&json!(true)), Some(1));
        assert_eq!(as_int(&json!("5.5")), None);
        assert_eq!(as_int(&json!("abc")), None);
        assert_eq!(as_int(&json!(null)), None);
        assert_eq!(as_int(&json!([1])), None);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(as_float(&json!(1.5)), Some(1.5));
        assert_eq!(as_float(&json!("2.25")), Some(2.25));
        assert_eq!(as_float(&json!(false)), Some(0.0));
        assert_eq!(as_float(&json!({"a": 1})), None);
    }

    #[test]
    fn test_boolean_conversion() {
        assert_eq!(as_boolean(&json!(true)), Some(true));
        assert_eq!(as_boolean(&json!(0)), Some(false));
        assert_eq!(as_boolean(&json!(2)), Some(true));
        assert_eq!(as_boolean(&json!("Yes")), Some(true));
        assert_eq!(as_boolean(&json!("nope")), Some(false));
        assert_eq!(as_boolean(&json!(null)), None);
    }
}
