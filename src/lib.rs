#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! # Hookhost
//!
//! Plugin infrastructure for extensible hosts.
//!
//! Hookhost discovers plugins from folders and code-registered entry points,
//! filters them against disabled lists, blacklists, obsolete hooks and host
//! compatibility, and keeps every accepted plugin's live instance together
//! with the capabilities it provides.
//!
//! ## Features
//!
//! - **Discovery**: `plugin.toml` manifests in plugin folders, or entry points in code
//! - **Filtering**: disabled list, obsolete hooks, blacklist, compatibility, validators
//! - **Dispatch**: ordered capability queries and fault-isolated multi-plugin calls
//! - **Settings**: per-plugin settings scoped below `plugins.<identifier>` with
//!   defaults, overlays and value preprocessors
//!
//! ## Quick Start
//!
//! ```no_run
//! use hookhost::plugin::{ManagerOptions, PluginFolder, StartupPlugin};
//!
//! let manager = hookhost::initialize(
//!     ManagerOptions::default().with_folder(PluginFolder::new("plugins")),
//! )?;
//!
//! for (identifier, plugin) in manager.implementations::<dyn StartupPlugin>(None)? {
//!     if let Err(error) = plugin.on_after_startup() {
//!         eprintln!("{identifier}: {error}");
//!     }
//! }
//! # Ok::<(), hookhost::plugin::PluginError>(())
//! ```

pub mod config;
pub mod plugin;
pub mod settings;

pub use config::PluginConfig;
pub use plugin::{
    initialize, plugin_manager, Capability, CapabilityTable, CapabilityTag, EntryPoint,
    ManagerOptions, Plugin, PluginDescriptor, PluginError, PluginManager, PluginManifest,
    PluginResult, PluginState,
};
pub use settings::{MemorySettings, PluginSettings, SettingsError, SettingsStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "hookhost";
