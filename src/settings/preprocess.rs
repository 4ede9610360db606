//! Value transforms applied after reading or before writing a setting.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::value::{display_path, to_path};
use super::{SettingsError, SettingsResult};

/// A single value transform.
pub type Preprocessor = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Transforms keyed by the exact settings path they apply to.
#[derive(Clone, Default)]
pub struct Preprocessors {
    entries: HashMap<Vec<String>, Preprocessor>,
}

impl std::fmt::Debug for Preprocessors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<String> = self.entries.keys().map(|path| display_path(path)).collect();
        paths.sort();
        f.debug_struct("Preprocessors").field("paths", &paths).finish()
    }
}

impl Preprocessors {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform for `path`, builder style.
    pub fn with<F>(mut self, path: &[&str], transform: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.insert(path, transform);
        self
    }

    /// Add a transform for `path`, replacing an existing one.
    pub fn insert<F>(&mut self, path: &[&str], transform: F)
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.entries.insert(to_path(path), Arc::new(transform));
    }

    /// The same transforms with every path nested under `prefix`.
    pub fn prefixed(&self, prefix: &[String]) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(path, transform)| {
                let mut full = prefix.to_vec();
                full.extend(path.iter().cloned());
                (full, Arc::clone(transform))
            })
            .collect();
        Self { entries }
    }

    /// The transform registered for exactly `path`.
    pub fn get(&self, path: &[String]) -> Option<&Preprocessor> {
        self.entries.get(path)
    }

    /// Number of registered transforms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no transform is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply the transform for `path` and, for object results, the transforms
    /// registered below it.
    pub fn apply(&self, path: &[String], value: Value) -> SettingsResult<Value> {
        if self.entries.is_empty() {
            return Ok(value);
        }

        let mut value = match self.entries.get(path) {
            Some(transform) => transform(value).map_err(|source| SettingsError::Preprocessor {
                path: display_path(path),
                source,
            })?,
            None => value,
        };

        let has_nested =
            self.entries.keys().any(|key| key.len() > path.len() && key.starts_with(path));
        if has_nested {
            if let Value::Object(map) = &mut value {
                for (key, child) in map.iter_mut() {
                    let mut child_path = path.to_vec();
                    child_path.push(key.clone());
                    *child = self.apply(&child_path, child.take())?;
                }
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upper() -> impl Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static {
        |value: Value| Ok(Value::String(value.as_str().unwrap_or_default().to_uppercase()))
    }

    #[test]
    fn test_exact_match() {
        let preprocessors = Preprocessors::new().with(&["name"], upper());

        let result = preprocessors.apply(&to_path(&["name"]), json!("octo")).unwrap();
        assert_eq!(result, json!("OCTO"));

        let untouched = preprocessors.apply(&to_path(&["other"]), json!("octo")).unwrap();
        assert_eq!(untouched, json!("octo"));
    }

    #[test]
    fn test_nested_application() {
        let preprocessors = Preprocessors::new().with(&["a", "name"], upper());

        let result =
            preprocessors.apply(&to_path(&["a"]), json!({"name": "octo", "size": 3})).unwrap();
        assert_eq!(result, json!({"name": "OCTO", "size": 3}));
    }

    #[test]
    fn test_prefixed() {
        let preprocessors = Preprocessors::new().with(&["name"], upper());
        let prefixed = preprocessors.prefixed(&to_path(&["plugins", "foo"]));

        assert!(prefixed.get(&to_path(&["plugins", "foo", "name"])).is_some());
        assert!(prefixed.get(&to_path(&["name"])).is_none());
        assert_eq!(prefixed.len(), 1);
    }

    #[test]
    fn test_errors_propagate() {
        let preprocessors =
            Preprocessors::new().with(&["bad"], |_| Err(anyhow::anyhow!("refusing value")));

        let result = preprocessors.apply(&to_path(&["bad"]), json!(1));
        match result {
            Err(SettingsError::Preprocessor { path, source }) => {
                assert_eq!(path, "bad");
                assert_eq!(source.to_string(), "refusing value");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
