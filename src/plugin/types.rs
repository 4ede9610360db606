//! Core plugin types.

use serde::{Deserialize, Serialize};

/// Where a plugin was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginOrigin {
    /// Found by scanning a plugin folder.
    Folder,
    /// Registered in code through an entry point.
    EntryPoint,
}

impl PluginOrigin {
    /// Get the display name for this origin.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::EntryPoint => "entry point",
        }
    }
}

impl std::fmt::Display for PluginOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Lifecycle state of a discovered plugin.
///
/// `Discovered` moves to `Validated` or one of the `Rejected*` states, a
/// validated plugin then ends up `Enabled` or `Disabled`. Rejections are
/// terminal for the lifetime of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginState {
    /// Found, not yet filtered.
    Discovered,
    /// Passed all filters, not yet activated.
    Validated,
    /// Host version or capability requirements are not met.
    RejectedIncompatible,
    /// Listed in the blacklist.
    RejectedBlacklisted,
    /// Implements a hook that is no longer available.
    RejectedObsoleteHook,
    /// Refused by a validator, or failed to load.
    RejectedValidator,
    /// Active and taking part in dispatch.
    Enabled,
    /// Known but excluded from dispatch.
    Disabled,
}

impl PluginState {
    /// Get the display name for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Validated => "validated",
            Self::RejectedIncompatible => "rejected-incompatible",
            Self::RejectedBlacklisted => "rejected-blacklisted",
            Self::RejectedObsoleteHook => "rejected-obsolete-hook",
            Self::RejectedValidator => "rejected-validator",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    /// Whether this is one of the terminal rejection states.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::RejectedIncompatible
                | Self::RejectedBlacklisted
                | Self::RejectedObsoleteHook
                | Self::RejectedValidator
        )
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase in which a validator is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPhase {
    /// After the built-in filters, before the instance is constructed.
    BeforeLoad,
    /// After the instance and its capability table exist.
    AfterLoad,
}

impl std::fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BeforeLoad => write!(f, "before_load"),
            Self::AfterLoad => write!(f, "after_load"),
        }
    }
}

/// Host version assumed when none is configured.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Plugin manifest file name.
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Manifest file extension for single-file plugins.
pub const MANIFEST_EXTENSION: &str = "toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(PluginState::Enabled.to_string(), "enabled");
        assert_eq!(PluginState::RejectedObsoleteHook.to_string(), "rejected-obsolete-hook");
    }

    #[test]
    fn test_state_is_rejected() {
        assert!(PluginState::RejectedBlacklisted.is_rejected());
        assert!(PluginState::RejectedValidator.is_rejected());
        assert!(!PluginState::Disabled.is_rejected());
        assert!(!PluginState::Enabled.is_rejected());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&PluginState::RejectedIncompatible).unwrap();
        assert_eq!(json, "\"rejected-incompatible\"");
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(PluginOrigin::Folder.to_string(), "folder");
        assert_eq!(PluginOrigin::EntryPoint.to_string(), "entry point");
    }
}
