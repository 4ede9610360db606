//! Layered settings for plugins.
//!
//! Settings live in one hierarchical JSON tree owned by a [`SettingsStore`].
//! Each plugin reads and writes through a [`PluginSettings`] facade which
//! scopes paths below `plugins.<key>`, merges declared defaults and applies
//! per-path [`Preprocessors`].
//!
//! Values resolve from three layers, highest precedence first:
//!
//! 1. explicitly stored values
//! 2. overlays, the most recently added one winning
//! 3. defaults
//!
//! ```
//! use std::sync::Arc;
//! use hookhost::settings::{MemorySettings, PluginSettings};
//! use serde_json::json;
//!
//! let store = Arc::new(MemorySettings::new());
//! let settings = PluginSettings::new(store, "timelapse").with_defaults(json!({"fps": 25}));
//!
//! assert_eq!(settings.get_int(&["fps"]).unwrap(), Some(25));
//! settings.set_int(&["fps"], 500, Some(1), Some(60)).unwrap();
//! assert_eq!(settings.get_int(&["fps"]).unwrap(), Some(60));
//! ```

mod error;
mod memory;
mod plugin;
mod preprocess;
mod store;
pub mod value;

pub use error::{SettingsError, SettingsResult};
pub use memory::MemorySettings;
pub use plugin::{plugin_settings, plugin_settings_for_settings_plugin, PluginSettings, CONFIG_VERSION_KEY};
pub use preprocess::{Preprocessor, Preprocessors};
pub use store::{GetOptions, SetOptions, SettingsStore};
