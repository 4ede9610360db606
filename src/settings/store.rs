//! The settings store contract.
//!
//! A store holds one hierarchical JSON tree addressed by path segments. The
//! plugin facade only ever talks to this trait, so hosts can back it with
//! whatever persistence they already have.

use std::path::PathBuf;

use serde_json::Value;

use super::value::{as_boolean, as_float, as_int, display_path};
use super::{Preprocessors, SettingsResult};

/// Options for reads.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Deep-merge object values from all layers instead of taking the top one.
    pub merged: bool,
    /// Default tree (rooted like the store) used instead of the store's own.
    pub defaults: Option<Value>,
    /// Transforms applied to the resolved value.
    pub preprocessors: Option<Preprocessors>,
}

impl GetOptions {
    /// Plain read.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merged read.
    pub fn merged() -> Self {
        Self { merged: true, ..Self::default() }
    }

    /// Set the merged flag.
    pub fn with_merged(mut self, merged: bool) -> Self {
        self.merged = merged;
        self
    }

    /// Use `defaults` as the default layer.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Apply `preprocessors` to the resolved value.
    pub fn with_preprocessors(mut self, preprocessors: Preprocessors) -> Self {
        self.preprocessors = Some(preprocessors);
        self
    }
}

/// Options for writes.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Default tree used to decide whether the value needs storing at all.
    pub defaults: Option<Value>,
    /// Transforms applied before the value is written.
    pub preprocessors: Option<Preprocessors>,
    /// Store the value even if it equals its fallback.
    pub force: bool,
}

impl SetOptions {
    /// Plain write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forced write.
    pub fn forced() -> Self {
        Self { force: true, ..Self::default() }
    }

    /// Set the force flag.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Use `defaults` as the default layer.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Apply `preprocessors` before writing.
    pub fn with_preprocessors(mut self, preprocessors: Preprocessors) -> Self {
        self.preprocessors = Some(preprocessors);
        self
    }
}

/// Hierarchical settings storage shared by the whole process.
///
/// Implementations must make each call atomic with respect to other writers;
/// callers never hold locks across calls.
pub trait SettingsStore: Send + Sync {
    /// Whether any layer holds a value at `path`.
    fn has(&self, path: &[String], options: &GetOptions) -> bool;

    /// The value at `path`, resolved through explicit config, overlays and
    /// defaults.
    fn get(&self, path: &[String], options: &GetOptions) -> SettingsResult<Option<Value>>;

    /// Integer view of [`get`](Self::get). Unconvertible values are absent.
    fn get_int(&self, path: &[String], options: &GetOptions) -> SettingsResult<Option<i64>> {
        Ok(self.get(path, options)?.as_ref().and_then(as_int))
    }

    /// Float view of [`get`](Self::get).
    fn get_float(&self, path: &[String], options: &GetOptions) -> SettingsResult<Option<f64>> {
        Ok(self.get(path, options)?.as_ref().and_then(as_float))
    }

    /// Boolean view of [`get`](Self::get).
    fn get_boolean(&self, path: &[String], options: &GetOptions) -> SettingsResult<Option<bool>> {
        Ok(self.get(path, options)?.as_ref().and_then(as_boolean))
    }

    /// Store `value` at `path`.
    fn set(&self, path: &[String], value: Value, options: &SetOptions) -> SettingsResult<()>;

    /// Store `value` as an integer clamped to `min`/`max`.
    ///
    /// A value without integer view is logged and not stored.
    fn set_int(
        &self,
        path: &[String],
        value: Value,
        min: Option<i64>,
        max: Option<i64>,
        options: &SetOptions,
    ) -> SettingsResult<()> {
        let Some(number) = as_int(&value) else {
            tracing::warn!(path = %display_path(path), value = %value, "Not an integer, not storing");
            return Ok(());
        };
        self.set(path, Value::from(clamp(number, min, max)), options)
    }

    /// Store `value` as a float clamped to `min`/`max`.
    fn set_float(
        &self,
        path: &[String],
        value: Value,
        min: Option<f64>,
        max: Option<f64>,
        options: &SetOptions,
    ) -> SettingsResult<()> {
        let Some(number) = as_float(&value) else {
            tracing::warn!(path = %display_path(path), value = %value, "Not a float, not storing");
            return Ok(());
        };
        self.set(path, Value::from(clamp(number, min, max)), options)
    }

    /// Store `value` as a boolean.
    fn set_boolean(&self, path: &[String], value: Value, options: &SetOptions) -> SettingsResult<()> {
        let Some(flag) = as_boolean(&value) else {
            tracing::warn!(path = %display_path(path), value = %value, "Not a boolean, not storing");
            return Ok(());
        };
        self.set(path, Value::Bool(flag), options)
    }

    /// Delete the explicit value at `path`. Overlays and defaults stay.
    fn remove(&self, path: &[String]) -> SettingsResult<()>;

    /// Register an overlay layer and return its key.
    fn add_overlay(&self, overlay: Value) -> SettingsResult<String>;

    /// Deregister an overlay. Returns whether the key was known.
    fn remove_overlay(&self, key: &str) -> bool;

    /// The folder of type `kind`, created if missing.
    fn base_folder(&self, kind: &str) -> SettingsResult<PathBuf>;
}

/// Clamp `value` into `[min, max]`; `min` wins if the bounds cross.
pub(crate) fn clamp<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> T {
    let value = match max {
        Some(max) if value > max => max,
        _ => value,
    };
    match min {
        Some(min) if value < min => min,
        _ => value,
    }
}
