//! Settings error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors that can occur while reading or writing settings.
///
/// Failed type conversions are not errors: typed getters return `None`.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A get or set preprocessor failed.
    #[error("Preprocessor for '{path}' failed: {source}")]
    Preprocessor {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// A value on the way to `path` is a leaf, not an object.
    #[error("Cannot write '{path}': '{parent}' is not an object")]
    NotAnObject { path: String, parent: String },

    /// Overlays must be objects.
    #[error("Invalid overlay: {0}")]
    InvalidOverlay(String),

    /// The store does not know this base folder type.
    #[error("Unknown base folder '{0}'")]
    UnknownFolder(String),

    /// Settings migration of a plugin failed.
    #[error("Settings migration for plugin '{plugin}' failed: {source}")]
    Migration {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// IO error while preparing a folder.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
