//! Plugin registry and capability dispatch.
//!
//! Plugins are found in plugin folders (a `plugin.toml` manifest per plugin)
//! or registered in code as entry points. Every candidate runs through the
//! [`FilterPipeline`] once; accepted ones are constructed through their
//! factory and declare the capabilities they provide in a
//! [`CapabilityTable`]. Host code then asks the [`PluginManager`] for all
//! enabled implementations of a capability, or calls them all at once with
//! failures isolated per plugin.
//!
//! # Example Configuration
//!
//! ```toml
//! disabled = ["cura_slicer"]
//! blacklist = ["broken_plugin", { identifier = "old_plugin", version = "<1.2" }]
//! restart_needing_hooks = ["host.server.http.*"]
//!
//! [[folders]]
//! path = "/usr/share/host/plugins"
//! bundled = true
//!
//! [sorting_order.temperature_graph]
//! "host.ui.tabs" = 10
//! ```

mod capability;
mod descriptor;
mod discovery;
mod dispatch;
mod error;
mod filter;
mod interfaces;
mod manager;
mod manifest;
mod types;

pub use capability::{Capability, CapabilityTable, CapabilityTag, Plugin};
pub use descriptor::{PluginDescriptor, PluginSummary};
pub use discovery::{scan_folder, Candidate, EntryPoint, PluginFactories, PluginFactory, PluginFolder};
pub use dispatch::{CallFailure, CallReport, Implementation, PluginCall};
pub use error::{PluginError, PluginResult};
pub use filter::{
    BlacklistEntry, FilterPipeline, Validator, Verdict, DEFAULT_CONSIDERED_BUNDLED,
    DEFAULT_OBSOLETE_HOOKS, DEFAULT_RESTART_NEEDING_HOOKS, DISABLED_REASON,
};
pub use interfaces::{SettingsPlugin, ShutdownPlugin, StartupPlugin};
pub use manager::{initialize, plugin_manager, ManagerOptions, PluginManager};
pub use manifest::{Compatibility, PluginManifest, PluginMetadata};
pub use types::{
    PluginOrigin, PluginState, ValidationPhase, HOST_VERSION, MANIFEST_EXTENSION, MANIFEST_FILE,
};
