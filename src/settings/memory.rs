//! In-memory settings store.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::value::{deep_merge, display_path, insert, lookup, remove};
use super::{GetOptions, SetOptions, SettingsError, SettingsResult, SettingsStore};

#[derive(Debug, Default)]
struct State {
    config: Value,
    /// Oldest first.
    overlays: Vec<(String, Value)>,
}

/// A [`SettingsStore`] that keeps everything in memory.
///
/// Resolution order is explicit config, then overlays (newest first), then
/// defaults. Nothing is persisted.
#[derive(Debug)]
pub struct MemorySettings {
    state: RwLock<State>,
    defaults: Value,
    base_dir: PathBuf,
    folders: HashMap<String, PathBuf>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySettings {
    /// Create an empty store rooted in the user data directory.
    pub fn new() -> Self {
        let base_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("hookhost");
        Self {
            state: RwLock::new(State { config: Value::Object(Map::new()), overlays: Vec::new() }),
            defaults: Value::Object(Map::new()),
            base_dir,
            folders: HashMap::new(),
        }
    }

    /// Use `defaults` when a read passes no defaults of its own.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }

    /// Start from `config` as explicit values.
    pub fn with_config(self, config: Value) -> Self {
        self.state.write().config = config;
        self
    }

    /// Root folder for [`base_folder`](SettingsStore::base_folder).
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Override the location of one folder type.
    pub fn with_folder(mut self, kind: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.folders.insert(kind.into(), path.into());
        self
    }

    /// The explicit value at `path`, ignoring overlays and defaults.
    pub fn explicit(&self, path: &[String]) -> Option<Value> {
        lookup(&self.state.read().config, path).cloned()
    }

    /// Copy of the explicit config tree.
    pub fn snapshot(&self) -> Value {
        self.state.read().config.clone()
    }

    /// Number of registered overlays.
    pub fn overlay_count(&self) -> usize {
        self.state.read().overlays.len()
    }

    fn defaults_for<'a>(&'a self, defaults: Option<&'a Value>) -> &'a Value {
        defaults.unwrap_or(&self.defaults)
    }

    /// Values at `path` from every layer, highest precedence first.
    fn layers<'a>(
        &'a self,
        state: &'a State,
        path: &[String],
        defaults: &'a Value,
        include_explicit: bool,
    ) -> Vec<&'a Value> {
        let explicit = include_explicit.then(|| lookup(&state.config, path)).flatten();
        explicit
            .into_iter()
            .chain(state.overlays.iter().rev().filter_map(|(_, overlay)| lookup(overlay, path)))
            .chain(lookup(defaults, path))
            .collect()
    }

    fn resolve(layers: &[&Value], merged: bool) -> Option<Value> {
        if !merged {
            return layers.first().map(|value| (*value).clone());
        }

        let mut iter = layers.iter().rev();
        let mut result = (*iter.next()?).clone();
        for layer in iter {
            deep_merge(&mut result, layer);
        }
        Some(result)
    }
}

impl SettingsStore for MemorySettings {
    fn has(&self, path: &[String], options: &GetOptions) -> bool {
        let state = self.state.read();
        let defaults = self.defaults_for(options.defaults.as_ref());
        !self.layers(&state, path, defaults, true).is_empty()
    }

    fn get(&self, path: &[String], options: &GetOptions) -> SettingsResult<Option<Value>> {
        let resolved = {
            let state = self.state.read();
            let defaults = self.defaults_for(options.defaults.as_ref());
            let layers = self.layers(&state, path, defaults, true);
            Self::resolve(&layers, options.merged)
        };

        match (resolved, &options.preprocessors) {
            (Some(value), Some(preprocessors)) => preprocessors.apply(path, value).map(Some),
            (resolved, _) => Ok(resolved),
        }
    }

    fn set(&self, path: &[String], value: Value, options: &SetOptions) -> SettingsResult<()> {
        let value = match &options.preprocessors {
            Some(preprocessors) => preprocessors.apply(path, value)?,
            None => value,
        };

        let mut state = self.state.write();
        if !options.force {
            let defaults = self.defaults_for(options.defaults.as_ref());
            let fallback = Self::resolve(&self.layers(&state, path, defaults, false), true);
            if fallback.as_ref() == Some(&value) {
                tracing::debug!(path = %display_path(path), "Value equals fallback, dropping explicit entry");
                remove(&mut state.config, path);
                return Ok(());
            }
        }

        tracing::debug!(path = %display_path(path), "Storing setting");
        insert(&mut state.config, path, value)
    }

    fn remove(&self, path: &[String]) -> SettingsResult<()> {
        if remove(&mut self.state.write().config, path) {
            tracing::debug!(path = %display_path(path), "Removed setting");
        }
        Ok(())
    }

    fn add_overlay(&self, overlay: Value) -> SettingsResult<String> {
        if !overlay.is_object() {
            return Err(SettingsError::InvalidOverlay(format!(
                "expected an object, got {overlay}"
            )));
        }

        let key = uuid::Uuid::new_v4().to_string();
        self.state.write().overlays.push((key.clone(), overlay));
        tracing::debug!(overlay = %key, "Added settings overlay");
        Ok(key)
    }

    fn remove_overlay(&self, key: &str) -> bool {
        let mut state = self.state.write();
        let before = state.overlays.len();
        state.overlays.retain(|(existing, _)| existing != key);
        before != state.overlays.len()
    }

    fn base_folder(&self, kind: &str) -> SettingsResult<PathBuf> {
        if kind.is_empty() {
            return Err(SettingsError::UnknownFolder(kind.to_string()));
        }

        let folder = self.folders.get(kind).cloned().unwrap_or_else(|| self.base_dir.join(kind));
        std::fs::create_dir_all(&folder)
            .map_err(|source| SettingsError::Io { path: folder.clone(), source })?;
        Ok(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::value::to_path;
    use crate::settings::Preprocessors;
    use serde_json::json;

    fn path(segments: &[&str]) -> Vec<String> {
        to_path(segments)
    }

    #[test]
    fn test_set_and_get() {
        let store = MemorySettings::new();
        store.set(&path(&["server", "port"]), json!(5000), &SetOptions::new()).unwrap();

        assert_eq!(store.get(&path(&["server", "port"]), &GetOptions::new()).unwrap(), Some(json!(5000)));
        assert_eq!(store.get(&path(&["server"]), &GetOptions::new()).unwrap(), Some(json!({"port": 5000})));
        assert!(store.has(&path(&["server", "port"]), &GetOptions::new()));
        assert!(!store.has(&path(&["server", "host"]), &GetOptions::new()));
    }

    #[test]
    fn test_layer_precedence() {
        let store = MemorySettings::new().with_defaults(json!({"x": 1}));
        assert_eq!(store.get(&path(&["x"]), &GetOptions::new()).unwrap(), Some(json!(1)));

        let first = store.add_overlay(json!({"x": 2})).unwrap();
        assert_eq!(store.get(&path(&["x"]), &GetOptions::new()).unwrap(), Some(json!(2)));

        let second = store.add_overlay(json!({"x": 4})).unwrap();
        assert_eq!(store.get(&path(&["x"]), &GetOptions::new()).unwrap(), Some(json!(4)));

        store.set(&path(&["x"]), json!(3), &SetOptions::new()).unwrap();
        assert_eq!(store.get(&path(&["x"]), &GetOptions::new()).unwrap(), Some(json!(3)));

        store.remove(&path(&["x"])).unwrap();
        assert!(store.remove_overlay(&second));
        assert_eq!(store.get(&path(&["x"]), &GetOptions::new()).unwrap(), Some(json!(2)));
        assert!(store.remove_overlay(&first));
        assert!(!store.remove_overlay(&first));
        assert_eq!(store.get(&path(&["x"]), &GetOptions::new()).unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_merged_get() {
        let store = MemorySettings::new()
            .with_defaults(json!({"a": {"x": 1, "y": 1, "z": 1}}))
            .with_config(json!({"a": {"x": 3}}));
        store.add_overlay(json!({"a": {"y": 2}})).unwrap();

        let plain = store.get(&path(&["a"]), &GetOptions::new()).unwrap();
        assert_eq!(plain, Some(json!({"x": 3})));

        let merged = store.get(&path(&["a"]), &GetOptions::merged()).unwrap();
        assert_eq!(merged, Some(json!({"x": 3, "y": 2, "z": 1})));
    }

    #[test]
    fn test_per_call_defaults_replace_store_defaults() {
        let store = MemorySettings::new().with_defaults(json!({"x": 1}));
        let options = GetOptions::new().with_defaults(json!({"y": 2}));

        assert_eq!(store.get(&path(&["x"]), &options).unwrap(), None);
        assert_eq!(store.get(&path(&["y"]), &options).unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_set_equal_to_default_drops_entry() {
        let store = MemorySettings::new().with_defaults(json!({"x": 1}));

        store.set(&path(&["x"]), json!(5), &SetOptions::new()).unwrap();
        assert_eq!(store.explicit(&path(&["x"])), Some(json!(5)));

        store.set(&path(&["x"]), json!(1), &SetOptions::new()).unwrap();
        assert_eq!(store.explicit(&path(&["x"])), None);
        assert_eq!(store.snapshot(), json!({}));

        store.set(&path(&["x"]), json!(1), &SetOptions::forced()).unwrap();
        assert_eq!(store.explicit(&path(&["x"])), Some(json!(1)));
    }

    #[test]
    fn test_preprocessors() {
        let store = MemorySettings::new();
        let double = Preprocessors::new()
            .with(&["n"], |value| Ok(json!(value.as_i64().unwrap_or_default() * 2)));

        store
            .set(&path(&["n"]), json!(2), &SetOptions::new().with_preprocessors(double.clone()))
            .unwrap();
        assert_eq!(store.explicit(&path(&["n"])), Some(json!(4)));

        let read = store.get(&path(&["n"]), &GetOptions::new().with_preprocessors(double)).unwrap();
        assert_eq!(read, Some(json!(8)));
    }

    #[test]
    fn test_typed_accessors() {
        let store = MemorySettings::new().with_config(json!({"n": "12", "f": "0.5", "b": "on", "o": {}}));

        assert_eq!(store.get_int(&path(&["n"]), &GetOptions::new()).unwrap(), Some(12));
        assert_eq!(store.get_float(&path(&["f"]), &GetOptions::new()).unwrap(), Some(0.5));
        assert_eq!(store.get_boolean(&path(&["b"]), &GetOptions::new()).unwrap(), Some(true));
        assert_eq!(store.get_int(&path(&["o"]), &GetOptions::new()).unwrap(), None);
        assert_eq!(store.get_int(&path(&["missing"]), &GetOptions::new()).unwrap(), None);
    }

    #[test]
    fn test_numeric_setters_clamp_and_convert() {
        let store = MemorySettings::new();

        store.set_int(&path(&["n"]), json!(50), Some(0), Some(10), &SetOptions::new()).unwrap();
        assert_eq!(store.explicit(&path(&["n"])), Some(json!(10)));

        store.set_float(&path(&["f"]), json!("-2.5"), Some(0.0), None, &SetOptions::new()).unwrap();
        assert_eq!(store.explicit(&path(&["f"])), Some(json!(0.0)));

        store.set_boolean(&path(&["b"]), json!("yes"), &SetOptions::new()).unwrap();
        assert_eq!(store.explicit(&path(&["b"])), Some(json!(true)));

        // Unconvertible values are not stored
        store.set_int(&path(&["bad"]), json!("many"), None, None, &SetOptions::new()).unwrap();
        assert_eq!(store.explicit(&path(&["bad"])), None);
    }

    #[test]
    fn test_overlay_must_be_object() {
        let store = MemorySettings::new();
        assert!(matches!(store.add_overlay(json!(3)), Err(SettingsError::InvalidOverlay(_))));
        assert_eq!(store.overlay_count(), 0);
    }

    #[test]
    fn test_base_folder() {
        let temp = tempfile::tempdir().unwrap();
        let custom = temp.path().join("elsewhere");
        let store = MemorySettings::new()
            .with_base_dir(temp.path())
            .with_folder("logs", &custom);

        let uploads = store.base_folder("uploads").unwrap();
        assert_eq!(uploads, temp.path().join("uploads"));
        assert!(uploads.is_dir());

        assert_eq!(store.base_folder("logs").unwrap(), custom);
        assert!(matches!(store.base_folder(""), Err(SettingsError::UnknownFolder(_))));
    }
}
