//! Plugin discovery from folders and code-registered entry points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{Plugin, PluginManifest, MANIFEST_EXTENSION, MANIFEST_FILE};

/// Constructs a plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;

/// Factories folder plugins can name as their `entry`.
#[derive(Clone, Default)]
pub struct PluginFactories {
    factories: HashMap<String, PluginFactory>,
}

impl std::fmt::Debug for PluginFactories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl PluginFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `entry`, builder style.
    pub fn with<F>(mut self, entry: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.register(entry, factory);
        self
    }

    /// Register `factory` under `entry`, replacing an earlier one.
    pub fn register<F>(&mut self, entry: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(entry.into(), Arc::new(factory));
    }

    pub fn get(&self, entry: &str) -> Option<PluginFactory> {
        self.factories.get(entry).cloned()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.factories.contains_key(entry)
    }

    /// Registered entry names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A folder scanned for plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFolder {
    pub path: PathBuf,
    /// Plugins found here ship with the host.
    #[serde(default)]
    pub bundled: bool,
}

impl PluginFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), bundled: false }
    }

    /// A folder whose plugins are considered bundled.
    pub fn bundled(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), bundled: true }
    }
}

/// A plugin registered in code rather than found on disk.
#[derive(Clone)]
pub struct EntryPoint {
    pub manifest: PluginManifest,
    pub factory: PluginFactory,
}

impl std::fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPoint").field("identifier", &self.manifest.identifier()).finish()
    }
}

impl EntryPoint {
    pub fn new<F>(manifest: PluginManifest, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        Self { manifest, factory: Arc::new(factory) }
    }

    /// Entry point for an instance that already exists.
    pub fn from_instance(manifest: PluginManifest, instance: Arc<dyn Plugin>) -> Self {
        Self::new(manifest, move || Ok(Arc::clone(&instance)))
    }
}

/// A manifest found in a plugin folder.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Manifest identifier, or the file or folder stem if it could not be read.
    pub identifier: String,
    /// Plugin folder or single-file manifest.
    pub location: PathBuf,
    pub bundled: bool,
    /// The validated manifest, or why it was unusable.
    pub manifest: Result<PluginManifest, String>,
}

impl Candidate {
    fn load(location: PathBuf, manifest_path: &Path, bundled: bool) -> Self {
        let stem = location
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        match PluginManifest::from_file(manifest_path) {
            Ok(manifest) => {
                let identifier = if manifest.identifier().is_empty() {
                    stem
                } else {
                    manifest.identifier().to_string()
                };
                let manifest = manifest.validate().map(|()| manifest).map_err(|e| e.to_string());
                Self { identifier, location, bundled, manifest }
            }
            Err(e) => Self { identifier: stem, location, bundled, manifest: Err(e.to_string()) },
        }
    }

    /// Factory key of this candidate: the manifest `entry`, else its identifier.
    pub fn entry(&self) -> Option<&str> {
        let manifest = self.manifest.as_ref().ok()?;
        Some(manifest.plugin.entry.as_deref().unwrap_or(manifest.identifier()))
    }
}

/// Find plugin manifests directly below `folder`.
///
/// Each sub-directory holding a `plugin.toml` and each top-level `*.toml`
/// file is a candidate. Entries starting with `.` or `_` are ignored. The
/// result is sorted by file name.
pub fn scan_folder(folder: &PluginFolder) -> Vec<Candidate> {
    if !folder.path.is_dir() {
        tracing::warn!(folder = %folder.path.display(), "Plugin folder does not exist, skipping");
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(&folder.path).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(folder = %folder.path.display(), error = %e, "Could not read plugin folder entry");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }

        let path = entry.path();
        if entry.file_type().is_dir() {
            let manifest_path = path.join(MANIFEST_FILE);
            if manifest_path.is_file() {
                candidates.push(Candidate::load(path.to_path_buf(), &manifest_path, folder.bundled));
            } else {
                tracing::debug!(path = %path.display(), "No plugin manifest, skipping");
            }
        } else if path.extension().and_then(|ext| ext.to_str()) == Some(MANIFEST_EXTENSION) {
            candidates.push(Candidate::load(path.to_path_buf(), path, folder.bundled));
        }
    }

    tracing::debug!(folder = %folder.path.display(), count = candidates.len(), "Scanned plugin folder");
    candidates
}
