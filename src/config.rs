//! Plugin configuration loaded from TOML files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::plugin::{
    BlacklistEntry, PluginFolder, DEFAULT_CONSIDERED_BUNDLED, DEFAULT_OBSOLETE_HOOKS,
    DEFAULT_RESTART_NEEDING_HOOKS,
};

/// Local configuration file, checked first.
pub const LOCAL_CONFIG_FILE: &str = ".hookhost.toml";

/// Filter and discovery settings for the plugin manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Folders scanned for plugins, in order
    pub folders: Vec<PluginFolder>,

    /// Plugins that are known but not loaded
    pub disabled: Vec<String>,

    /// Plugins that must never load
    pub blacklist: Vec<BlacklistEntry>,

    /// Dispatch rank overrides per plugin and sorting context
    pub sorting_order: HashMap<String, HashMap<String, i64>>,

    /// Hook patterns whose implementers need a restart when toggled
    pub restart_needing_hooks: Vec<String>,

    /// Hooks that no longer exist
    pub obsolete_hooks: Vec<String>,

    /// Plugins shipped with the host
    pub considered_bundled: Vec<String>,

    /// Plugins exempt from blacklist and compatibility checks.
    /// Meant for plugin development only.
    pub compatibility_ignored: Vec<String>,

    /// Host version checked against plugin requirements
    pub host_version: Option<String>,

    /// Capabilities the host offers
    pub host_capabilities: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            disabled: Vec::new(),
            blacklist: Vec::new(),
            sorting_order: HashMap::new(),
            restart_needing_hooks: to_strings(DEFAULT_RESTART_NEEDING_HOOKS),
            obsolete_hooks: to_strings(DEFAULT_OBSOLETE_HOOKS),
            considered_bundled: to_strings(DEFAULT_CONSIDERED_BUNDLED),
            compatibility_ignored: Vec::new(),
            host_version: None,
            host_capabilities: Vec::new(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

impl PluginConfig {
    /// Load configuration from the default locations.
    pub fn load() -> anyhow::Result<Self> {
        // Try local config first
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        // Try global config
        if let Some(global_config) = Self::global_config_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded plugin configuration");
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `<config_dir>/hookhost/plugins.toml`
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hookhost").join("plugins.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PluginConfig::default();
        assert!(config.folders.is_empty());
        assert_eq!(config.obsolete_hooks, vec!["host.comm.protocol.gcode".to_string()]);
        assert_eq!(config.restart_needing_hooks.len(), 4);
        assert!(config.considered_bundled.contains(&"pi_support".to_string()));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: PluginConfig = toml::from_str("disabled = [\"foo\"]\n").unwrap();
        assert_eq!(config.disabled, vec!["foo".to_string()]);
        assert_eq!(config.obsolete_hooks, PluginConfig::default().obsolete_hooks);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
disabled = ["a"]
compatibility_ignored = ["dev_plugin"]
host_version = "1.10.0"
host_capabilities = ["webcam"]
blacklist = ["b", { identifier = "c", version = ">=1, <1.3" }]
obsolete_hooks = []

[[folders]]
path = "/opt/plugins"
bundled = true

[[folders]]
path = "plugins"

[sorting_order.a]
"host.ui.tabs" = 2
"#;
        let config: PluginConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.folders.len(), 2);
        assert!(config.folders[0].bundled);
        assert!(!config.folders[1].bundled);
        assert_eq!(config.blacklist[1], BlacklistEntry::Versioned {
            identifier: "c".to_string(),
            version: ">=1, <1.3".to_string()
        });
        assert!(config.obsolete_hooks.is_empty());
        assert_eq!(config.sorting_order["a"]["host.ui.tabs"], 2);
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("plugins.toml");

        let config = PluginConfig { disabled: vec!["x".to_string()], ..PluginConfig::default() };
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(PluginConfig::load_from_file(&path).unwrap(), config);
        assert!(PluginConfig::load_from_file(&temp.path().join("missing.toml")).is_err());
    }
}
