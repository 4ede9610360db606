//! Per-plugin view onto the shared settings store.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::store::clamp;
use super::value::{to_path, wrap};
use super::{GetOptions, Preprocessors, SetOptions, SettingsError, SettingsResult, SettingsStore};
use crate::plugin::SettingsPlugin;

/// Leaf recording which settings layout a plugin's stored data follows.
pub const CONFIG_VERSION_KEY: &str = "_config_version";

/// Settings access for one plugin.
///
/// Scoped methods rewrite every path `P` to `["plugins", key] + P` and apply
/// the plugin's defaults and preprocessors. The `global_*` methods pass paths
/// through untouched and skip both. The facade keeps no state of its own
/// besides those declarations, every read and write goes to the store.
#[derive(Clone)]
pub struct PluginSettings {
    store: Arc<dyn SettingsStore>,
    plugin_key: String,
    prefix: Vec<String>,
    defaults: Option<Value>,
    get_preprocessors: Preprocessors,
    set_preprocessors: Preprocessors,
}

impl std::fmt::Debug for PluginSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSettings")
            .field("plugin_key", &self.plugin_key)
            .field("defaults", &self.defaults)
            .field("get_preprocessors", &self.get_preprocessors)
            .field("set_preprocessors", &self.set_preprocessors)
            .finish()
    }
}

impl PluginSettings {
    /// Create a facade for `plugin_key` without defaults or preprocessors.
    pub fn new(store: Arc<dyn SettingsStore>, plugin_key: impl Into<String>) -> Self {
        let plugin_key = plugin_key.into();
        let prefix = vec!["plugins".to_string(), plugin_key.clone()];
        Self {
            store,
            plugin_key,
            prefix,
            defaults: None,
            get_preprocessors: Preprocessors::new(),
            set_preprocessors: Preprocessors::new(),
        }
    }

    /// Declare the plugin's default subtree.
    ///
    /// Object defaults get a `_config_version` leaf of `null` unless they
    /// already carry one.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        let defaults = match defaults {
            Value::Object(mut map) => {
                map.entry(CONFIG_VERSION_KEY.to_string()).or_insert(Value::Null);
                Value::Object(map)
            }
            other => other,
        };
        self.defaults = Some(wrap(&self.prefix, defaults));
        self
    }

    /// Transforms applied after scoped reads, keyed by plugin-relative path.
    pub fn with_get_preprocessors(mut self, preprocessors: Preprocessors) -> Self {
        self.get_preprocessors = preprocessors.prefixed(&self.prefix);
        self
    }

    /// Transforms applied before scoped writes, keyed by plugin-relative path.
    pub fn with_set_preprocessors(mut self, preprocessors: Preprocessors) -> Self {
        self.set_preprocessors = preprocessors.prefixed(&self.prefix);
        self
    }

    /// The scoping key.
    pub fn plugin_key(&self) -> &str {
        &self.plugin_key
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    fn scoped(&self, path: &[&str]) -> Vec<String> {
        let mut full = self.prefix.clone();
        full.extend(path.iter().map(|segment| (*segment).to_string()));
        full
    }

    fn get_options(&self, merged: bool) -> GetOptions {
        self.complete_get_options(GetOptions::new().with_merged(merged))
    }

    fn complete_get_options(&self, mut options: GetOptions) -> GetOptions {
        if options.defaults.is_none() {
            options.defaults.clone_from(&self.defaults);
        }
        if options.preprocessors.is_none() && !self.get_preprocessors.is_empty() {
            options.preprocessors = Some(self.get_preprocessors.clone());
        }
        options
    }

    fn set_options(&self, force: bool) -> SetOptions {
        SetOptions {
            defaults: self.defaults.clone(),
            preprocessors: (!self.set_preprocessors.is_empty())
                .then(|| self.set_preprocessors.clone()),
            force,
        }
    }

    /// Whether a value (explicit, overlay or default) exists at `path`.
    pub fn has(&self, path: &[&str]) -> bool {
        self.store.has(&self.scoped(path), &self.get_options(false))
    }

    /// The value at `path`.
    pub fn get(&self, path: &[&str]) -> SettingsResult<Option<Value>> {
        self.store.get(&self.scoped(path), &self.get_options(false))
    }

    /// The value at `path` with defaults and overlays merged beneath it.
    pub fn get_merged(&self, path: &[&str]) -> SettingsResult<Option<Value>> {
        self.store.get(&self.scoped(path), &self.get_options(true))
    }

    /// The value at `path` with explicit read options.
    ///
    /// Options that leave defaults or preprocessors unset get the plugin's.
    pub fn get_with(&self, path: &[&str], options: GetOptions) -> SettingsResult<Option<Value>> {
        self.store.get(&self.scoped(path), &self.complete_get_options(options))
    }

    /// Integer at `path`, absent if missing or not convertible.
    pub fn get_int(&self, path: &[&str]) -> SettingsResult<Option<i64>> {
        self.store.get_int(&self.scoped(path), &self.get_options(false))
    }

    /// Float at `path`.
    pub fn get_float(&self, path: &[&str]) -> SettingsResult<Option<f64>> {
        self.store.get_float(&self.scoped(path), &self.get_options(false))
    }

    /// Boolean at `path`.
    pub fn get_boolean(&self, path: &[&str]) -> SettingsResult<Option<bool>> {
        self.store.get_boolean(&self.scoped(path), &self.get_options(false))
    }

    /// Integer at `path`, clamped to `min`/`max` on read.
    pub fn get_int_clamped(
        &self,
        path: &[&str],
        min: Option<i64>,
        max: Option<i64>,
    ) -> SettingsResult<Option<i64>> {
        Ok(self.get_int(path)?.map(|value| clamp(value, min, max)))
    }

    /// Float at `path`, clamped to `min`/`max` on read.
    pub fn get_float_clamped(
        &self,
        path: &[&str],
        min: Option<f64>,
        max: Option<f64>,
    ) -> SettingsResult<Option<f64>> {
        Ok(self.get_float(path)?.map(|value| clamp(value, min, max)))
    }

    /// Integer at `path`, or `fallback`.
    pub fn get_int_or(&self, path: &[&str], fallback: i64) -> SettingsResult<i64> {
        Ok(self.get_int(path)?.unwrap_or(fallback))
    }

    /// Float at `path`, or `fallback`.
    pub fn get_float_or(&self, path: &[&str], fallback: f64) -> SettingsResult<f64> {
        Ok(self.get_float(path)?.unwrap_or(fallback))
    }

    /// Boolean at `path`, or `fallback`.
    pub fn get_boolean_or(&self, path: &[&str], fallback: bool) -> SettingsResult<bool> {
        Ok(self.get_boolean(path)?.unwrap_or(fallback))
    }

    /// Store `value` at `path`.
    pub fn set(&self, path: &[&str], value: impl Into<Value>) -> SettingsResult<()> {
        self.store.set(&self.scoped(path), value.into(), &self.set_options(false))
    }

    /// Store `value` at `path` even if it equals its default.
    pub fn set_forced(&self, path: &[&str], value: impl Into<Value>) -> SettingsResult<()> {
        self.store.set(&self.scoped(path), value.into(), &self.set_options(true))
    }

    /// Store an integer, clamped to `min`/`max`.
    pub fn set_int(
        &self,
        path: &[&str],
        value: impl Into<Value>,
        min: Option<i64>,
        max: Option<i64>,
    ) -> SettingsResult<()> {
        self.store.set_int(&self.scoped(path), value.into(), min, max, &self.set_options(false))
    }

    /// Store a float, clamped to `min`/`max`.
    pub fn set_float(
        &self,
        path: &[&str],
        value: impl Into<Value>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> SettingsResult<()> {
        self.store.set_float(&self.scoped(path), value.into(), min, max, &self.set_options(false))
    }

    /// Store a boolean.
    pub fn set_boolean(&self, path: &[&str], value: impl Into<Value>) -> SettingsResult<()> {
        self.store.set_boolean(&self.scoped(path), value.into(), &self.set_options(false))
    }

    /// Remove the explicit value at `path`.
    pub fn remove(&self, path: &[&str]) -> SettingsResult<()> {
        self.store.remove(&self.scoped(path))
    }

    /// Register `overlay` (plugin-relative) as an override layer.
    pub fn add_overlay(&self, overlay: Value) -> SettingsResult<String> {
        if !overlay.is_object() {
            return Err(SettingsError::InvalidOverlay(format!(
                "overlay for plugin '{}' must be an object",
                self.plugin_key
            )));
        }
        self.store.add_overlay(wrap(&self.prefix, overlay))
    }

    /// Deregister an overlay added with [`add_overlay`](Self::add_overlay).
    pub fn remove_overlay(&self, key: &str) -> bool {
        self.store.remove_overlay(key)
    }

    /// The whole plugin subtree, merged with defaults and preprocessed.
    pub fn get_all_data(&self) -> SettingsResult<Value> {
        let data = self.store.get(&self.prefix, &self.get_options(true))?;
        Ok(data.unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// The whole plugin subtree with explicit read options.
    ///
    /// Unset defaults and preprocessors are filled in with the plugin's. Pass
    /// an empty default tree or an empty [`Preprocessors`] to read without
    /// them.
    pub fn get_all_data_with(&self, options: GetOptions) -> SettingsResult<Value> {
        let data = self.store.get(&self.prefix, &self.complete_get_options(options))?;
        Ok(data.unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Replace the plugin subtree with `data`.
    pub fn set_all_data(&self, data: Value) -> SettingsResult<()> {
        self.store.set(&self.prefix, data, &self.set_options(false))
    }

    /// Delete every explicit value of the plugin.
    pub fn clean_all_data(&self) -> SettingsResult<()> {
        tracing::info!(plugin = %self.plugin_key, "Removing all plugin settings");
        self.store.remove(&self.prefix)
    }

    /// Run the plugin's settings migration if the stored layout is older
    /// than the one it declares. Returns whether a migration ran.
    pub fn migrate(&self, plugin: &dyn SettingsPlugin) -> SettingsResult<bool> {
        let Some(target) = plugin.settings_version() else {
            return Ok(false);
        };

        let current = self.get_int(&[CONFIG_VERSION_KEY])?;
        if current.is_some_and(|current| current >= target) {
            return Ok(false);
        }

        tracing::info!(plugin = %self.plugin_key, from = ?current, to = target, "Migrating plugin settings");
        plugin
            .on_settings_migrate(target, current)
            .map_err(|source| SettingsError::Migration { plugin: self.plugin_key.clone(), source })?;
        self.store.set(
            &self.scoped(&[CONFIG_VERSION_KEY]),
            Value::from(target),
            &self.set_options(true),
        )?;
        Ok(true)
    }

    /// Path of the plugin's log file, `plugin_<key>[_<postfix>].log`.
    pub fn plugin_logfile_path(&self, postfix: Option<&str>) -> SettingsResult<PathBuf> {
        let name = match postfix {
            Some(postfix) => format!("plugin_{}_{postfix}.log", self.plugin_key),
            None => format!("plugin_{}.log", self.plugin_key),
        };
        Ok(self.store.base_folder("logs")?.join(name))
    }

    /// Whether a value exists at the unscoped `path`.
    pub fn global_has(&self, path: &[&str]) -> bool {
        self.store.has(&to_path(path), &GetOptions::new())
    }

    /// Read the unscoped `path`.
    pub fn global_get(&self, path: &[&str], options: &GetOptions) -> SettingsResult<Option<Value>> {
        self.store.get(&to_path(path), options)
    }

    /// Integer at the unscoped `path`.
    pub fn global_get_int(&self, path: &[&str]) -> SettingsResult<Option<i64>> {
        self.store.get_int(&to_path(path), &GetOptions::new())
    }

    /// Float at the unscoped `path`.
    pub fn global_get_float(&self, path: &[&str]) -> SettingsResult<Option<f64>> {
        self.store.get_float(&to_path(path), &GetOptions::new())
    }

    /// Boolean at the unscoped `path`.
    pub fn global_get_boolean(&self, path: &[&str]) -> SettingsResult<Option<bool>> {
        self.store.get_boolean(&to_path(path), &GetOptions::new())
    }

    /// Write the unscoped `path`.
    pub fn global_set(&self, path: &[&str], value: impl Into<Value>) -> SettingsResult<()> {
        self.store.set(&to_path(path), value.into(), &SetOptions::new())
    }

    /// Write an integer to the unscoped `path`, clamped to `min`/`max`.
    pub fn global_set_int(
        &self,
        path: &[&str],
        value: impl Into<Value>,
        min: Option<i64>,
        max: Option<i64>,
    ) -> SettingsResult<()> {
        self.store.set_int(&to_path(path), value.into(), min, max, &SetOptions::new())
    }

    /// Write a float to the unscoped `path`, clamped to `min`/`max`.
    pub fn global_set_float(
        &self,
        path: &[&str],
        value: impl Into<Value>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> SettingsResult<()> {
        self.store.set_float(&to_path(path), value.into(), min, max, &SetOptions::new())
    }

    /// Write a boolean to the unscoped `path`.
    pub fn global_set_boolean(&self, path: &[&str], value: impl Into<Value>) -> SettingsResult<()> {
        self.store.set_boolean(&to_path(path), value.into(), &SetOptions::new())
    }

    /// Remove the explicit value at the unscoped `path`.
    pub fn global_remove(&self, path: &[&str]) -> SettingsResult<()> {
        self.store.remove(&to_path(path))
    }

    /// The store folder of type `kind`.
    pub fn global_get_basefolder(&self, kind: &str) -> SettingsResult<PathBuf> {
        self.store.base_folder(kind)
    }

    /// Data folder of the plugin, `<data>/<key>`, created if missing.
    #[deprecated(note = "use global_get_basefolder(\"data\")")]
    pub fn get_plugin_data_folder(&self) -> SettingsResult<PathBuf> {
        let folder = self.store.base_folder("data")?.join(&self.plugin_key);
        std::fs::create_dir_all(&folder)
            .map_err(|source| SettingsError::Io { path: folder.clone(), source })?;
        Ok(folder)
    }
}

/// camelCase names kept for hosts ported from older plugin APIs.
#[allow(non_snake_case)]
impl PluginSettings {
    #[deprecated(note = "use get_int")]
    pub fn getInt(&self, path: &[&str]) -> SettingsResult<Option<i64>> {
        self.get_int(path)
    }

    #[deprecated(note = "use get_float")]
    pub fn getFloat(&self, path: &[&str]) -> SettingsResult<Option<f64>> {
        self.get_float(path)
    }

    #[deprecated(note = "use get_boolean")]
    pub fn getBoolean(&self, path: &[&str]) -> SettingsResult<Option<bool>> {
        self.get_boolean(path)
    }

    #[deprecated(note = "use set_int")]
    pub fn setInt(
        &self,
        path: &[&str],
        value: impl Into<Value>,
        min: Option<i64>,
        max: Option<i64>,
    ) -> SettingsResult<()> {
        self.set_int(path, value, min, max)
    }

    #[deprecated(note = "use set_float")]
    pub fn setFloat(
        &self,
        path: &[&str],
        value: impl Into<Value>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> SettingsResult<()> {
        self.set_float(path, value, min, max)
    }

    #[deprecated(note = "use set_boolean")]
    pub fn setBoolean(&self, path: &[&str], value: impl Into<Value>) -> SettingsResult<()> {
        self.set_boolean(path, value)
    }
}

/// Plain settings facade for `plugin_key`.
pub fn plugin_settings(plugin_key: impl Into<String>, store: Arc<dyn SettingsStore>) -> PluginSettings {
    PluginSettings::new(store, plugin_key)
}

/// Settings facade carrying the defaults and preprocessors `plugin` declares.
///
/// Returns `None` if the plugin fails to hand out its preprocessors.
pub fn plugin_settings_for_settings_plugin(
    plugin_key: impl Into<String>,
    plugin: &dyn SettingsPlugin,
    store: Arc<dyn SettingsStore>,
) -> Option<PluginSettings> {
    let plugin_key = plugin_key.into();
    let (get_preprocessors, set_preprocessors) = match plugin.settings_preprocessors() {
        Ok(preprocessors) => preprocessors,
        Err(error) => {
            tracing::error!(plugin = %plugin_key, error = %error, "Could not get settings preprocessors");
            return None;
        }
    };

    Some(
        PluginSettings::new(store, plugin_key)
            .with_defaults(plugin.settings_defaults())
            .with_get_preprocessors(get_preprocessors)
            .with_set_preprocessors(set_preprocessors),
    )
}
