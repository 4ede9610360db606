//! Plugin manifest parsing and validation.
//!
//! A plugin manifest is a TOML file that describes a plugin's identity, the
//! hook namespaces it implements and what it requires from the host.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{PluginError, PluginResult};

/// Plugin manifest containing metadata and host requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin metadata.
    pub plugin: PluginMetadata,
    /// Host requirements.
    #[serde(default)]
    pub compatibility: Compatibility,
}

/// Plugin metadata section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique plugin identifier.
    pub identifier: String,
    /// Human readable name, defaults to the identifier.
    #[serde(default)]
    pub name: Option<String>,
    /// Plugin version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Plugin author.
    #[serde(default)]
    pub author: Option<String>,
    /// Plugin description.
    #[serde(default)]
    pub description: Option<String>,
    /// Factory key used to construct folder plugins.
    #[serde(default)]
    pub entry: Option<String>,
    /// Hook namespaces this plugin implements.
    #[serde(default)]
    pub hooks: Vec<String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

/// Requirements a plugin places on the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compatibility {
    /// Semver requirement the host version has to satisfy.
    #[serde(default)]
    pub host: Option<String>,
    /// Host capabilities that must be available.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl PluginManifest {
    /// Create a minimal manifest for a code-registered plugin.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            plugin: PluginMetadata {
                identifier: identifier.into(),
                name: None,
                version: default_version(),
                author: None,
                description: None,
                entry: None,
                hooks: Vec::new(),
            },
            compatibility: Compatibility::default(),
        }
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.plugin.version = version.into();
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.plugin.name = Some(name.into());
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.plugin.author = Some(author.into());
        self
    }

    /// Add an implemented hook namespace.
    pub fn with_hook(mut self, hook: impl Into<String>) -> Self {
        self.plugin.hooks.push(hook.into());
        self
    }

    /// Require a host version.
    pub fn requires_host(mut self, requirement: impl Into<String>) -> Self {
        self.compatibility.host = Some(requirement.into());
        self
    }

    /// Require a host capability.
    pub fn requires_capability(mut self, capability: impl Into<String>) -> Self {
        self.compatibility.capabilities.push(capability.into());
        self
    }

    /// Parse a manifest from TOML string.
    pub fn from_toml(content: &str) -> PluginResult<Self> {
        toml::from_str(content).map_err(|e| PluginError::InvalidManifest(e.to_string()))
    }

    /// Parse a manifest from a file.
    pub fn from_file(path: &Path) -> PluginResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| PluginError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&content)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> PluginResult<String> {
        toml::to_string_pretty(self).map_err(|e| PluginError::InvalidManifest(e.to_string()))
    }

    /// The plugin identifier.
    pub fn identifier(&self) -> &str {
        &self.plugin.identifier
    }

    /// The display name, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.plugin.name.as_deref().unwrap_or(&self.plugin.identifier)
    }

    /// The parsed version, if it is valid semver.
    pub fn parsed_version(&self) -> Option<semver::Version> {
        semver::Version::parse(self.plugin.version.trim()).ok()
    }

    /// Validate the manifest.
    pub fn validate(&self) -> PluginResult<()> {
        let identifier = &self.plugin.identifier;
        if identifier.is_empty() {
            return Err(PluginError::InvalidManifest("Plugin identifier is required".to_string()));
        }

        if !identifier.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(PluginError::InvalidManifest(format!(
                "Plugin identifier '{identifier}' must contain only alphanumeric characters, hyphens, and underscores"
            )));
        }

        if self.plugin.version.trim().is_empty() {
            return Err(PluginError::InvalidManifest("Plugin version is required".to_string()));
        }

        if let Some(requirement) = &self.compatibility.host {
            semver::VersionReq::parse(requirement).map_err(|e| {
                PluginError::InvalidManifest(format!(
                    "Invalid host requirement '{requirement}': {e}"
                ))
            })?;
        }

        if self.plugin.hooks.iter().any(|hook| hook.trim().is_empty()) {
            return Err(PluginError::InvalidManifest("Hook namespaces must not be empty".to_string()));
        }

        Ok(())
    }

    /// Check whether the host requirement is met by `host_version`.
    ///
    /// Manifests without a host requirement are compatible with every host.
    pub fn is_compatible_with(&self, host_version: &semver::Version) -> bool {
        match &self.compatibility.host {
            None => true,
            Some(requirement) => semver::VersionReq::parse(requirement)
                .map(|req| req.matches(host_version))
                .unwrap_or(false),
        }
    }

    /// Host capabilities required by the manifest but missing from `available`.
    pub fn missing_capabilities<'a>(&'a self, available: &[String]) -> Vec<&'a str> {
        self.compatibility
            .capabilities
            .iter()
            .filter(|required| !available.contains(required))
            .map(String::as_str)
            .collect()
    }
}
