//! Plugin system error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur during plugin operations.
///
/// Rejections during discovery are not errors: they end up as a terminal
/// [`PluginState`](super::PluginState) on the plugin's descriptor. Only the
/// registry's own invariants surface here.
#[derive(Debug, Error)]
pub enum PluginError {
    /// `initialize` was called on a manager that already ran discovery.
    #[error("Plugin manager already initialized")]
    AlreadyInitialized,

    /// The manager was used before `initialize` succeeded.
    #[error("Plugin manager not initialized yet")]
    NotInitialized,

    /// A plugin with the same identifier is already registered.
    #[error("Plugin '{identifier}' is already registered (origin: {existing})")]
    Conflict { identifier: String, existing: String },

    /// No plugin with that identifier is known.
    #[error("Plugin '{0}' not found")]
    NotFound(String),

    /// The plugin is in a state that does not allow the requested transition.
    #[error("Plugin '{identifier}' cannot be {action} while {state}")]
    InvalidState { identifier: String, action: &'static str, state: String },

    /// Invalid plugin manifest.
    #[error("Invalid plugin manifest: {0}")]
    InvalidManifest(String),

    /// The manifest references an entry no factory is registered for.
    #[error("No plugin factory registered for entry '{0}'")]
    UnknownEntry(String),

    /// Constructing the plugin instance failed.
    #[error("Failed to load plugin '{identifier}': {message}")]
    LoadError { identifier: String, message: String },

    /// A success callback of `call_plugin` failed, dispatch was aborted.
    #[error("Callback for plugin '{plugin}' failed: {source}")]
    Callback {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while reading a plugin folder or manifest.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    /// Whether this error belongs to the init-guard family.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::AlreadyInitialized | Self::NotInitialized | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(PluginError::AlreadyInitialized.to_string(), "Plugin manager already initialized");
        assert_eq!(PluginError::NotInitialized.to_string(), "Plugin manager not initialized yet");

        let conflict =
            PluginError::Conflict { identifier: "foo".to_string(), existing: "folder".to_string() };
        assert!(conflict.to_string().contains("'foo' is already registered"));
    }

    #[test]
    fn test_is_configuration() {
        assert!(PluginError::AlreadyInitialized.is_configuration());
        assert!(PluginError::NotInitialized.is_configuration());
        assert!(!PluginError::NotFound("x".to_string()).is_configuration());
    }
}
