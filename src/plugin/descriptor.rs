//! Registry record of one discovered plugin.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::discovery::PluginFactory;
use super::{CapabilityTable, Plugin, PluginManifest, PluginOrigin, PluginState};

/// Identity, location and lifecycle state of a discovered plugin.
///
/// Descriptors are owned by the manager; callers get clones. The live
/// instance and its capability table are shared through `Arc`s, so a clone
/// is cheap and always points at the same instance.
#[derive(Clone)]
pub struct PluginDescriptor {
    manifest: PluginManifest,
    origin: PluginOrigin,
    location: Option<PathBuf>,
    state: PluginState,
    reason: Option<String>,
    rank: usize,
    restart_required: bool,
    considered_bundled: bool,
    factory: Option<PluginFactory>,
    instance: Option<Arc<dyn Plugin>>,
    capabilities: Arc<CapabilityTable>,
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("identifier", &self.identifier())
            .field("version", &self.manifest.plugin.version)
            .field("origin", &self.origin)
            .field("state", &self.state)
            .field("reason", &self.reason)
            .field("rank", &self.rank)
            .field("restart_required", &self.restart_required)
            .field("considered_bundled", &self.considered_bundled)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl PluginDescriptor {
    pub(crate) fn new(manifest: PluginManifest, origin: PluginOrigin, rank: usize) -> Self {
        Self {
            manifest,
            origin,
            location: None,
            state: PluginState::Discovered,
            reason: None,
            rank,
            restart_required: false,
            considered_bundled: false,
            factory: None,
            instance: None,
            capabilities: Arc::new(CapabilityTable::new()),
        }
    }

    pub(crate) fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub(crate) fn with_factory(mut self, factory: Option<PluginFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub(crate) fn with_flags(mut self, restart_required: bool, considered_bundled: bool) -> Self {
        self.restart_required = restart_required;
        self.considered_bundled = considered_bundled;
        self
    }

    pub(crate) fn set_state(&mut self, state: PluginState, reason: Option<String>) {
        self.state = state;
        self.reason = reason;
    }

    pub(crate) fn mark_restart_required(&mut self) {
        self.restart_required = true;
    }

    pub(crate) fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }

    pub(crate) fn factory(&self) -> Option<&PluginFactory> {
        self.factory.as_ref()
    }

    pub(crate) fn attach(&mut self, instance: Arc<dyn Plugin>, capabilities: CapabilityTable) {
        self.instance = Some(instance);
        self.capabilities = Arc::new(capabilities);
    }

    /// Unique identifier.
    pub fn identifier(&self) -> &str {
        self.manifest.identifier()
    }

    /// Display name.
    pub fn name(&self) -> &str {
        self.manifest.display_name()
    }

    /// Declared version string.
    pub fn version(&self) -> &str {
        &self.manifest.plugin.version
    }

    /// Author, if declared.
    pub fn author(&self) -> Option<&str> {
        self.manifest.plugin.author.as_deref()
    }

    /// Hook namespaces the plugin declares.
    pub fn hooks(&self) -> &[String] {
        &self.manifest.plugin.hooks
    }

    /// The full manifest.
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn origin(&self) -> PluginOrigin {
        self.origin
    }

    /// Folder or manifest file the plugin was found at.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Why the plugin was rejected or disabled.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Position in discovery order; the default dispatch rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Whether toggling this plugin needs a host restart to take effect.
    pub fn restart_required(&self) -> bool {
        self.restart_required
    }

    pub fn considered_bundled(&self) -> bool {
        self.considered_bundled
    }

    /// The live instance, once activated.
    pub fn instance(&self) -> Option<&Arc<dyn Plugin>> {
        self.instance.as_ref()
    }

    /// Capabilities of the live instance. Empty until activated.
    pub fn capabilities(&self) -> &Arc<CapabilityTable> {
        &self.capabilities
    }

    /// Whether the plugin takes part in dispatch.
    pub fn is_enabled(&self) -> bool {
        self.state == PluginState::Enabled && self.instance.is_some()
    }

    /// Serializable status record.
    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            identifier: self.identifier().to_string(),
            name: self.name().to_string(),
            version: self.version().to_string(),
            author: self.author().map(str::to_string),
            origin: self.origin,
            location: self.location.clone(),
            state: self.state,
            reason: self.reason.clone(),
            restart_required: self.restart_required,
            bundled: self.considered_bundled,
            capabilities: self.capabilities.tags().iter().map(|tag| tag.name().to_string()).collect(),
            hooks: self.hooks().to_vec(),
        }
    }
}

/// Plugin status for UIs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    pub identifier: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub origin: PluginOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    pub state: PluginState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub restart_required: bool,
    pub bundled: bool,
    pub capabilities: Vec<String>,
    pub hooks: Vec<String>,
}
