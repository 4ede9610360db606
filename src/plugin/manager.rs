//! Plugin manager: discovery, filtering, activation and lifecycle.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use super::discovery::{scan_folder, EntryPoint, PluginFactories, PluginFolder};
use super::dispatch::panic_message;
use super::filter::{
    BlacklistEntry, FilterPipeline, Validator, Verdict, DEFAULT_CONSIDERED_BUNDLED,
    DEFAULT_OBSOLETE_HOOKS, DEFAULT_RESTART_NEEDING_HOOKS, DISABLED_REASON,
};
use super::{
    CapabilityTable, PluginDescriptor, PluginError, PluginManifest, PluginOrigin,
    PluginResult, PluginState, PluginSummary, ValidationPhase, HOST_VERSION,
};
use crate::config::PluginConfig;

/// Everything the manager needs to discover and filter plugins.
#[derive(Clone)]
pub struct ManagerOptions {
    /// Folders scanned in order.
    pub folders: Vec<PluginFolder>,
    /// Code-registered plugins, discovered after all folders.
    pub entry_points: Vec<EntryPoint>,
    /// Factories folder plugins name as their `entry`.
    pub factories: PluginFactories,
    /// Identifiers that are discovered but not activated.
    pub disabled: Vec<String>,
    pub blacklist: Vec<BlacklistEntry>,
    /// Dispatch rank overrides, `identifier -> context -> rank`.
    pub sorting_order: HashMap<String, HashMap<String, i64>>,
    /// Glob patterns of hooks whose implementers need a restart.
    pub restart_needing_hooks: Vec<String>,
    pub obsolete_hooks: Vec<String>,
    pub considered_bundled: Vec<String>,
    /// Identifiers exempt from blacklist and compatibility checks.
    pub compatibility_ignored: Vec<String>,
    pub validators: Vec<Validator>,
    pub host_version: semver::Version,
    pub host_capabilities: Vec<String>,
}

impl std::fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("folders", &self.folders)
            .field("entry_points", &self.entry_points)
            .field("factories", &self.factories)
            .field("disabled", &self.disabled)
            .field("blacklist", &self.blacklist)
            .field("sorting_order", &self.sorting_order)
            .field("restart_needing_hooks", &self.restart_needing_hooks)
            .field("obsolete_hooks", &self.obsolete_hooks)
            .field("considered_bundled", &self.considered_bundled)
            .field("compatibility_ignored", &self.compatibility_ignored)
            .field("validators", &self.validators.len())
            .field("host_version", &self.host_version)
            .field("host_capabilities", &self.host_capabilities)
            .finish()
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            entry_points: Vec::new(),
            factories: PluginFactories::new(),
            disabled: Vec::new(),
            blacklist: Vec::new(),
            sorting_order: HashMap::new(),
            restart_needing_hooks: to_strings(DEFAULT_RESTART_NEEDING_HOOKS),
            obsolete_hooks: to_strings(DEFAULT_OBSOLETE_HOOKS),
            considered_bundled: to_strings(DEFAULT_CONSIDERED_BUNDLED),
            compatibility_ignored: Vec::new(),
            validators: Vec::new(),
            host_version: semver::Version::parse(HOST_VERSION)
                .unwrap_or_else(|_| semver::Version::new(0, 0, 0)),
            host_capabilities: Vec::new(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

impl ManagerOptions {
    /// Options taken from a configuration file.
    ///
    /// Entry points, factories and validators only exist in code and have to
    /// be added afterwards.
    pub fn from_config(config: &PluginConfig) -> PluginResult<Self> {
        let host_version = match &config.host_version {
            Some(version) => semver::Version::parse(version.trim()).map_err(|e| {
                PluginError::Config(format!("Invalid host version '{version}': {e}"))
            })?,
            None => Self::default().host_version,
        };

        Ok(Self {
            folders: config.folders.clone(),
            disabled: config.disabled.clone(),
            blacklist: config.blacklist.clone(),
            sorting_order: config.sorting_order.clone(),
            restart_needing_hooks: config.restart_needing_hooks.clone(),
            obsolete_hooks: config.obsolete_hooks.clone(),
            considered_bundled: config.considered_bundled.clone(),
            compatibility_ignored: config.compatibility_ignored.clone(),
            host_version,
            host_capabilities: config.host_capabilities.clone(),
            ..Self::default()
        })
    }

    pub fn with_folder(mut self, folder: PluginFolder) -> Self {
        self.folders.push(folder);
        self
    }

    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.entry_points.push(entry_point);
        self
    }

    pub fn with_factories(mut self, factories: PluginFactories) -> Self {
        self.factories = factories;
        self
    }

    /// Put `identifier` on the disabled list.
    pub fn disable(mut self, identifier: impl Into<String>) -> Self {
        self.disabled.push(identifier.into());
        self
    }

    pub fn blacklist(mut self, entry: BlacklistEntry) -> Self {
        self.blacklist.push(entry);
        self
    }

    /// Exempt `identifier` from blacklist and compatibility checks.
    pub fn ignore_compatibility(mut self, identifier: impl Into<String>) -> Self {
        self.compatibility_ignored.push(identifier.into());
        self
    }

    pub fn with_sorting_order(
        mut self,
        identifier: impl Into<String>,
        context: impl Into<String>,
        rank: i64,
    ) -> Self {
        self.sorting_order.entry(identifier.into()).or_default().insert(context.into(), rank);
        self
    }

    pub fn with_restart_needing_hook(mut self, pattern: impl Into<String>) -> Self {
        self.restart_needing_hooks.push(pattern.into());
        self
    }

    pub fn with_obsolete_hook(mut self, hook: impl Into<String>) -> Self {
        self.obsolete_hooks.push(hook.into());
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(ValidationPhase, &PluginDescriptor) -> bool + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn with_host_version(mut self, version: semver::Version) -> Self {
        self.host_version = version;
        self
    }

    pub fn with_host_capability(mut self, capability: impl Into<String>) -> Self {
        self.host_capabilities.push(capability.into());
        self
    }
}

/// Descriptor storage guarded by the manager's lock.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) initialized: bool,
    pub(crate) plugins: Vec<PluginDescriptor>,
    index: HashMap<String, usize>,
    /// Identifiers held by a plugin whose manifest was unusable.
    malformed: HashSet<String>,
    duplicates: Vec<PluginDescriptor>,
    pub(crate) sorting_order: HashMap<String, HashMap<String, i64>>,
    next_rank: usize,
}

impl Registry {
    pub(crate) fn get(&self, identifier: &str) -> Option<&PluginDescriptor> {
        self.index.get(identifier).map(|&position| &self.plugins[position])
    }

    fn get_mut(&mut self, identifier: &str) -> Option<&mut PluginDescriptor> {
        self.index.get(identifier).map(|&position| &mut self.plugins[position])
    }

    fn take_rank(&mut self) -> usize {
        let rank = self.next_rank;
        self.next_rank += 1;
        rank
    }

    /// Why `identifier` cannot be claimed. A malformed plugin only keeps its
    /// identifier against other malformed ones.
    fn conflict(&self, identifier: &str, malformed: bool) -> Option<PluginError> {
        if !malformed && self.malformed.contains(identifier) {
            return None;
        }
        self.get(identifier).map(|existing| PluginError::Conflict {
            identifier: identifier.to_string(),
            existing: existing.origin().to_string(),
        })
    }

    /// Store `descriptor`, returning the malformed plugin it displaced.
    fn insert(&mut self, descriptor: PluginDescriptor, malformed: bool) -> Option<PluginDescriptor> {
        let identifier = descriptor.identifier().to_string();
        if malformed {
            self.malformed.insert(identifier.clone());
        } else if self.malformed.remove(&identifier) {
            if let Some(&position) = self.index.get(&identifier) {
                return Some(std::mem::replace(&mut self.plugins[position], descriptor));
            }
        }
        self.index.insert(identifier, self.plugins.len());
        self.plugins.push(descriptor);
        None
    }

    fn displace(&mut self, mut previous: PluginDescriptor, by: PluginOrigin) {
        tracing::warn!(plugin = %previous.identifier(), origin = %by, "Malformed plugin replaced by a valid one with the same identifier");
        let reason = previous.reason().unwrap_or_default().to_string();
        previous.set_state(
            PluginState::RejectedValidator,
            Some(format!("{reason} (identifier taken over by {by} plugin)")),
        );
        self.duplicates.push(previous);
    }

    fn count(&self, predicate: impl Fn(&PluginDescriptor) -> bool) -> usize {
        self.plugins.iter().filter(|descriptor| predicate(descriptor)).count()
    }
}

/// The registry of all discovered plugins.
///
/// A manager is created uninitialized. [`initialize`](Self::initialize) runs
/// discovery exactly once; everything else fails with
/// [`PluginError::NotInitialized`] before that.
pub struct PluginManager {
    options: ManagerOptions,
    filter: FilterPipeline,
    registry: RwLock<Registry>,
    init_guard: Mutex<bool>,
    /// Held across load-and-commit by every runtime mutation.
    mutation: Mutex<()>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("initialized", &self.is_initialized())
            .field("filter", &self.filter)
            .finish()
    }
}

impl PluginManager {
    /// Create an uninitialized manager.
    pub fn new(options: ManagerOptions) -> Self {
        let filter = FilterPipeline::new(&options);
        Self {
            options,
            filter,
            registry: RwLock::new(Registry::default()),
            init_guard: Mutex::new(false),
            mutation: Mutex::new(()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.read().initialized
    }

    /// The compiled filter settings.
    pub fn filter(&self) -> &FilterPipeline {
        &self.filter
    }

    /// Discover, filter and activate all plugins.
    pub fn initialize(&self) -> PluginResult<()> {
        let mut initialized = self.init_guard.lock();
        if *initialized {
            return Err(PluginError::AlreadyInitialized);
        }

        let mut registry = Registry {
            sorting_order: self.options.sorting_order.clone(),
            ..Registry::default()
        };

        for (mut descriptor, malformed) in self.discover() {
            let rank = registry.take_rank();
            descriptor.set_rank(rank);

            if let Some(conflict) = registry.conflict(descriptor.identifier(), malformed) {
                tracing::warn!(plugin = %descriptor.identifier(), origin = %descriptor.origin(), error = %conflict, "Duplicate plugin identifier, keeping the first one");
                descriptor.set_state(PluginState::RejectedValidator, Some(conflict.to_string()));
                registry.duplicates.push(descriptor);
                continue;
            }

            if descriptor.state() == PluginState::Discovered {
                self.process(&mut descriptor, false);
            }
            let origin = descriptor.origin();
            if let Some(previous) = registry.insert(descriptor, malformed) {
                registry.displace(previous, origin);
            }
        }

        registry.initialized = true;
        tracing::info!(
            total = registry.plugins.len(),
            enabled = registry.count(|d| d.state() == PluginState::Enabled),
            disabled = registry.count(|d| d.state() == PluginState::Disabled),
            rejected = registry.count(|d| d.state().is_rejected()),
            duplicates = registry.duplicates.len(),
            "Plugin discovery finished"
        );

        *self.registry.write() = registry;
        *initialized = true;
        Ok(())
    }

    /// Descriptors for every folder candidate and entry point, in discovery
    /// order, each flagged whether its manifest was malformed. Malformed
    /// manifests come back already rejected.
    fn discover(&self) -> Vec<(PluginDescriptor, bool)> {
        let mut descriptors = Vec::new();

        for folder in &self.options.folders {
            for candidate in scan_folder(folder) {
                let entry = candidate.entry().map(str::to_string);
                let malformed = candidate.manifest.is_err();
                let descriptor = match candidate.manifest {
                    Ok(manifest) => {
                        let factory = entry.as_deref().and_then(|entry| self.options.factories.get(entry));
                        PluginDescriptor::new(manifest, PluginOrigin::Folder, 0).with_factory(factory)
                    }
                    Err(reason) => {
                        tracing::warn!(plugin = %candidate.identifier, location = %candidate.location.display(), reason = %reason, "Malformed plugin");
                        let mut descriptor = PluginDescriptor::new(
                            PluginManifest::new(candidate.identifier.clone()),
                            PluginOrigin::Folder,
                            0,
                        );
                        descriptor.set_state(PluginState::RejectedValidator, Some(reason));
                        descriptor
                    }
                };

                let bundled = candidate.bundled || self.filter.is_bundled(descriptor.identifier());
                let restart = self.filter.needs_restart(descriptor.hooks());
                descriptors.push((
                    descriptor.with_location(candidate.location).with_flags(restart, bundled),
                    malformed,
                ));
            }
        }

        for entry_point in &self.options.entry_points {
            let mut descriptor = self.entry_point_descriptor(entry_point);
            let malformed = match entry_point.manifest.validate() {
                Ok(()) => false,
                Err(e) => {
                    tracing::warn!(plugin = %descriptor.identifier(), error = %e, "Malformed plugin");
                    descriptor.set_state(PluginState::RejectedValidator, Some(e.to_string()));
                    true
                }
            };
            descriptors.push((descriptor, malformed));
        }

        descriptors
    }

    fn entry_point_descriptor(&self, entry_point: &EntryPoint) -> PluginDescriptor {
        let identifier = entry_point.manifest.identifier();
        let restart = self.filter.needs_restart(&entry_point.manifest.plugin.hooks);
        let bundled = self.filter.is_bundled(identifier);
        PluginDescriptor::new(entry_point.manifest.clone(), PluginOrigin::EntryPoint, 0)
            .with_factory(Some(Arc::clone(&entry_point.factory)))
            .with_flags(restart, bundled)
    }

    /// Run the filter pipeline and, if accepted, activate.
    fn process(&self, descriptor: &mut PluginDescriptor, skip_disabled: bool) {
        match self.filter.check(descriptor, skip_disabled) {
            Verdict::Accept => {
                descriptor.set_state(PluginState::Validated, None);
                self.activate(descriptor);
            }
            Verdict::Disabled => {
                tracing::debug!(plugin = %descriptor.identifier(), "Plugin is disabled");
                descriptor.set_state(PluginState::Disabled, Some(DISABLED_REASON.to_string()));
            }
            Verdict::Reject(state, reason) => {
                tracing::warn!(plugin = %descriptor.identifier(), state = %state, reason = %reason, "Plugin rejected");
                descriptor.set_state(state, Some(reason));
            }
        }
    }

    /// Construct the instance, collect its capabilities and run the
    /// after-load validators.
    fn activate(&self, descriptor: &mut PluginDescriptor) {
        let identifier = descriptor.identifier().to_string();

        let Some(factory) = descriptor.factory().cloned() else {
            let entry = descriptor.manifest().plugin.entry.clone().unwrap_or_else(|| identifier.clone());
            self.reject_load(descriptor, PluginError::UnknownEntry(entry).to_string());
            return;
        };

        let loaded = guarded(|| {
            let instance = factory()?;
            let mut table = CapabilityTable::new();
            Arc::clone(&instance).implements(&mut table);
            Ok((instance, table))
        });
        let (instance, table) = match loaded {
            Ok(loaded) => loaded,
            Err(message) => {
                self.reject_load(descriptor, message);
                return;
            }
        };
        let handled: Vec<String> = table.hook_namespaces().into_iter().map(str::to_string).collect();
        descriptor.attach(Arc::clone(&instance), table);

        if let Some(reason) = self.filter.obsolete_reason(&handled) {
            tracing::warn!(plugin = %identifier, reason = %reason, "Plugin handles obsolete hooks");
            descriptor.set_state(PluginState::RejectedObsoleteHook, Some(reason));
            return;
        }
        if self.filter.needs_restart(&handled) {
            descriptor.mark_restart_required();
        }

        if !self.filter.validate(ValidationPhase::AfterLoad, descriptor) {
            tracing::warn!(plugin = %identifier, "Plugin refused by validator after loading");
            descriptor.set_state(
                PluginState::RejectedValidator,
                Some(format!("Refused by validator ({})", ValidationPhase::AfterLoad)),
            );
            return;
        }

        if let Err(message) = guarded(|| instance.on_loaded(&identifier)) {
            self.reject_load(descriptor, message);
            return;
        }

        tracing::debug!(plugin = %identifier, capabilities = ?descriptor.capabilities(), "Plugin enabled");
        descriptor.set_state(PluginState::Enabled, None);
    }

    fn reject_load(&self, descriptor: &mut PluginDescriptor, message: String) {
        let error = PluginError::LoadError { identifier: descriptor.identifier().to_string(), message };
        tracing::warn!(plugin = %descriptor.identifier(), error = %error, "Could not load plugin");
        descriptor.set_state(PluginState::RejectedValidator, Some(error.to_string()));
    }

    fn read(&self) -> PluginResult<RwLockReadGuard<'_, Registry>> {
        let registry = self.registry.read();
        if registry.initialized {
            Ok(registry)
        } else {
            Err(PluginError::NotInitialized)
        }
    }

    /// Run `f` against a consistent view of the registry.
    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> PluginResult<R> {
        let registry = self.read()?;
        Ok(f(&registry))
    }

    /// All descriptors, in discovery order.
    pub fn plugins(&self) -> PluginResult<Vec<PluginDescriptor>> {
        Ok(self.read()?.plugins.clone())
    }

    /// The descriptor of `identifier`.
    pub fn plugin(&self, identifier: &str) -> PluginResult<PluginDescriptor> {
        self.read()?.get(identifier).cloned().ok_or_else(|| PluginError::NotFound(identifier.to_string()))
    }

    fn filtered(&self, predicate: impl Fn(&PluginDescriptor) -> bool) -> PluginResult<Vec<PluginDescriptor>> {
        Ok(self.read()?.plugins.iter().filter(|d| predicate(d)).cloned().collect())
    }

    pub fn enabled_plugins(&self) -> PluginResult<Vec<PluginDescriptor>> {
        self.filtered(PluginDescriptor::is_enabled)
    }

    pub fn disabled_plugins(&self) -> PluginResult<Vec<PluginDescriptor>> {
        self.filtered(|d| d.state() == PluginState::Disabled)
    }

    /// Rejected plugins; [`PluginDescriptor::reason`] says why.
    pub fn rejected_plugins(&self) -> PluginResult<Vec<PluginDescriptor>> {
        self.filtered(|d| d.state().is_rejected())
    }

    /// Later discoveries of identifiers that were already taken, and malformed
    /// plugins whose identifier a valid plugin took over.
    pub fn duplicates(&self) -> PluginResult<Vec<PluginDescriptor>> {
        Ok(self.read()?.duplicates.clone())
    }

    pub fn is_restart_needing(&self, identifier: &str) -> PluginResult<bool> {
        Ok(self.plugin(identifier)?.restart_required())
    }

    /// Status records of all plugins.
    pub fn summaries(&self) -> PluginResult<Vec<PluginSummary>> {
        Ok(self.read()?.plugins.iter().map(PluginDescriptor::summary).collect())
    }

    /// Enable a disabled plugin. Returns whether a restart is needed.
    ///
    /// A plugin disabled by configuration was never loaded; it now runs the
    /// remaining filters and gets activated. Concurrent calls are serialized,
    /// so the factory runs at most once.
    pub fn enable_plugin(&self, identifier: &str) -> PluginResult<bool> {
        let _mutation = self.mutation.lock();
        let current = self.plugin(identifier)?;
        match current.state() {
            PluginState::Enabled => return Ok(current.restart_required()),
            PluginState::Disabled => {}
            state => {
                return Err(PluginError::InvalidState {
                    identifier: identifier.to_string(),
                    action: "enabled",
                    state: state.to_string(),
                })
            }
        }

        let mut updated = current.clone();
        if updated.instance().is_some() {
            updated.set_state(PluginState::Enabled, None);
        } else {
            self.process(&mut updated, true);
        }

        let state = updated.state();
        let reason = updated.reason().map(str::to_string);
        let restart_required = updated.restart_required();

        let mut registry = self.registry.write();
        let slot = registry.get_mut(identifier).ok_or_else(|| PluginError::NotFound(identifier.to_string()))?;
        *slot = updated;
        drop(registry);

        if state == PluginState::Enabled {
            tracing::info!(plugin = %identifier, restart_required, "Plugin enabled");
            Ok(restart_required)
        } else {
            Err(PluginError::LoadError {
                identifier: identifier.to_string(),
                message: reason.unwrap_or_else(|| state.to_string()),
            })
        }
    }

    /// Take an enabled plugin out of dispatch. Returns whether a restart is
    /// needed.
    pub fn disable_plugin(&self, identifier: &str) -> PluginResult<bool> {
        let _mutation = self.mutation.lock();
        let mut registry = self.registry.write();
        if !registry.initialized {
            return Err(PluginError::NotInitialized);
        }

        let descriptor =
            registry.get_mut(identifier).ok_or_else(|| PluginError::NotFound(identifier.to_string()))?;
        match descriptor.state() {
            PluginState::Enabled => {
                descriptor.set_state(PluginState::Disabled, Some("Disabled at runtime".to_string()));
                tracing::info!(plugin = %identifier, restart_required = descriptor.restart_required(), "Plugin disabled");
                Ok(descriptor.restart_required())
            }
            PluginState::Disabled => Ok(descriptor.restart_required()),
            state => Err(PluginError::InvalidState {
                identifier: identifier.to_string(),
                action: "disabled",
                state: state.to_string(),
            }),
        }
    }

    /// Register a plugin after initialization.
    ///
    /// Returns the state the plugin ended up in.
    pub fn register_plugin(&self, entry_point: EntryPoint) -> PluginResult<PluginState> {
        entry_point.manifest.validate()?;
        let identifier = entry_point.manifest.identifier().to_string();

        let _mutation = self.mutation.lock();
        if let Some(conflict) = self.read()?.conflict(&identifier, false) {
            return Err(conflict);
        }

        let mut descriptor = self.entry_point_descriptor(&entry_point);
        self.process(&mut descriptor, false);

        let mut registry = self.registry.write();
        let rank = registry.take_rank();
        descriptor.set_rank(rank);
        let state = descriptor.state();
        if let Some(previous) = registry.insert(descriptor, false) {
            registry.displace(previous, PluginOrigin::EntryPoint);
        }

        tracing::info!(plugin = %identifier, state = %state, "Registered plugin");
        Ok(state)
    }

    /// Override the dispatch rank of `identifier` in `context`.
    pub fn set_sorting_order(&self, identifier: &str, context: &str, rank: i64) -> PluginResult<()> {
        let mut registry = self.registry.write();
        if !registry.initialized {
            return Err(PluginError::NotInitialized);
        }
        registry
            .sorting_order
            .entry(identifier.to_string())
            .or_default()
            .insert(context.to_string(), rank);
        Ok(())
    }

    /// Drop a rank override. Returns whether one existed.
    pub fn clear_sorting_order(&self, identifier: &str, context: &str) -> PluginResult<bool> {
        let mut registry = self.registry.write();
        if !registry.initialized {
            return Err(PluginError::NotInitialized);
        }
        let Some(contexts) = registry.sorting_order.get_mut(identifier) else {
            return Ok(false);
        };
        let removed = contexts.remove(context).is_some();
        if contexts.is_empty() {
            registry.sorting_order.remove(identifier);
        }
        Ok(removed)
    }

    /// The rank override of `identifier` in `context`, if any.
    pub fn sorting_order(&self, identifier: &str, context: &str) -> PluginResult<Option<i64>> {
        Ok(self.read()?.sorting_order.get(identifier).and_then(|contexts| contexts.get(context)).copied())
    }
}

/// Run plugin code, turning errors and panics into a message.
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(format!("{error:#}")),
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

static INSTANCE: OnceCell<Arc<PluginManager>> = OnceCell::new();
static INIT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Build and initialize the process-wide manager.
///
/// Fails with [`PluginError::AlreadyInitialized`] on every call after the
/// first successful one.
pub fn initialize(options: ManagerOptions) -> PluginResult<Arc<PluginManager>> {
    let _guard = INIT_LOCK.lock();
    if INSTANCE.get().is_some() {
        return Err(PluginError::AlreadyInitialized);
    }

    let manager = Arc::new(PluginManager::new(options));
    manager.initialize()?;
    INSTANCE.set(Arc::clone(&manager)).map_err(|_| PluginError::AlreadyInitialized)?;
    Ok(manager)
}

/// The process-wide manager.
pub fn plugin_manager() -> PluginResult<Arc<PluginManager>> {
    INSTANCE.get().cloned().ok_or(PluginError::NotInitialized)
}
