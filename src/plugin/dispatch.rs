//! Capability queries and fault-isolated plugin calls.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::manager::Registry;
use super::{Capability, CapabilityTable, CapabilityTag, Plugin, PluginError, PluginManager, PluginResult};

/// An enabled plugin that satisfies a capability query.
#[derive(Clone)]
pub struct Implementation {
    identifier: String,
    plugin: Arc<dyn Plugin>,
    capabilities: Arc<CapabilityTable>,
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Implementation")
            .field("identifier", &self.identifier)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl Implementation {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// The instance viewed as capability `C`.
    pub fn get<C: Capability + ?Sized>(&self) -> Option<Arc<C>> {
        self.capabilities.get::<C>()
    }
}

/// Why a single plugin call failed.
#[derive(Debug, Error)]
pub enum CallFailure {
    /// The plugin returned an error.
    #[error("{0:#}")]
    Error(anyhow::Error),
    /// The plugin panicked.
    #[error("panicked: {0}")]
    Panic(String),
}

/// Which plugins a [`PluginCall`] reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallReport {
    /// Every plugin invoked, in call order.
    pub called: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl CallReport {
    /// Whether no plugin failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Registry {
    /// Enabled plugins satisfying all `tags`, in dispatch order.
    ///
    /// Order is by rank, where a rank override for `sorting_context` replaces
    /// the discovery position. On equal rank overridden plugins come first,
    /// then identifiers decide.
    pub(crate) fn ordered(&self, tags: &[CapabilityTag], sorting_context: Option<&str>) -> Vec<Implementation> {
        let mut matches: Vec<(i64, bool, Implementation)> = self
            .plugins
            .iter()
            .filter(|descriptor| descriptor.is_enabled() && descriptor.capabilities().satisfies(tags))
            .filter_map(|descriptor| {
                let plugin = Arc::clone(descriptor.instance()?);
                let identifier = descriptor.identifier();
                let overridden = sorting_context.and_then(|context| {
                    self.sorting_order.get(identifier).and_then(|contexts| contexts.get(context)).copied()
                });
                let rank = overridden.unwrap_or_else(|| i64::try_from(descriptor.rank()).unwrap_or(i64::MAX));
                let implementation = Implementation {
                    identifier: identifier.to_string(),
                    plugin,
                    capabilities: Arc::clone(descriptor.capabilities()),
                };
                Some((rank, overridden.is_none(), implementation))
            })
            .collect();

        matches.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then_with(|| a.2.identifier.cmp(&b.2.identifier))
        });
        matches.into_iter().map(|(_, _, implementation)| implementation).collect()
    }
}

impl PluginManager {
    /// Enabled plugins satisfying every capability in `tags`.
    ///
    /// Reflects the registry at call time; nothing is cached.
    pub fn get_implementations(
        &self,
        tags: &[CapabilityTag],
        sorting_context: Option<&str>,
    ) -> PluginResult<Vec<Implementation>> {
        self.with_registry(|registry| registry.ordered(tags, sorting_context))
    }

    /// Enabled plugins providing capability `C`, as `(identifier, view)`.
    pub fn implementations<C: Capability + ?Sized>(
        &self,
        sorting_context: Option<&str>,
    ) -> PluginResult<Vec<(String, Arc<C>)>> {
        let implementations = self.get_implementations(&[CapabilityTag::of::<C>()], sorting_context)?;
        Ok(implementations
            .into_iter()
            .filter_map(|implementation| {
                let view = implementation.get::<C>()?;
                Some((implementation.identifier, view))
            })
            .collect())
    }

    /// Handlers of type `H` registered for `namespace`, ordered like
    /// implementations with the namespace as sorting context.
    pub fn get_hooks<H: ?Sized + Send + Sync + 'static>(
        &self,
        namespace: &str,
    ) -> PluginResult<Vec<(String, Arc<H>)>> {
        let implementations = self.get_implementations(&[], Some(namespace))?;
        Ok(implementations
            .into_iter()
            .filter_map(|implementation| {
                let handler = implementation.capabilities.hook_handler::<H>(namespace)?;
                Some((implementation.identifier, handler))
            })
            .collect())
    }

    /// Prepare a call of `method` on every plugin providing capability `C`.
    ///
    /// `invoke` performs the call through the capability view. Errors and
    /// panics it raises are logged, reported to the error callback and do
    /// not stop the remaining calls.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use hookhost::plugin::{
    ///     CapabilityTable, EntryPoint, ManagerOptions, Plugin, PluginManager, PluginManifest,
    ///     ShutdownPlugin,
    /// };
    ///
    /// struct Cleanup;
    ///
    /// impl ShutdownPlugin for Cleanup {
    ///     fn on_shutdown(&self) -> anyhow::Result<()> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// impl Plugin for Cleanup {
    ///     fn implements(self: Arc<Self>, table: &mut CapabilityTable) {
    ///         table.provide::<dyn ShutdownPlugin>(self);
    ///     }
    /// }
    ///
    /// let manager = PluginManager::new(ManagerOptions::default().with_entry_point(
    ///     EntryPoint::from_instance(PluginManifest::new("cleanup"), Arc::new(Cleanup)),
    /// ));
    /// manager.initialize().unwrap();
    ///
    /// let report = manager
    ///     .call_plugin::<dyn ShutdownPlugin, _, _>("on_shutdown", |plugin| plugin.on_shutdown())
    ///     .run()
    ///     .unwrap();
    /// assert_eq!(report.succeeded, vec!["cleanup".to_string()]);
    /// ```
    pub fn call_plugin<'m, C, R, F>(&'m self, method: &str, invoke: F) -> PluginCall<'m, C, R>
    where
        C: Capability + ?Sized,
        F: Fn(&C) -> anyhow::Result<R> + 'm,
    {
        PluginCall {
            manager: self,
            method: method.to_string(),
            invoke: Box::new(invoke),
            required: Vec::new(),
            sorting_context: None,
            on_success: None,
            on_error: None,
        }
    }
}

type SuccessCallback<'m, C, R> = Box<dyn FnMut(&str, &Arc<C>, R) -> anyhow::Result<()> + 'm>;
type ErrorCallback<'m, C> = Box<dyn FnMut(&str, &Arc<C>, &CallFailure) + 'm>;

/// A pending multi-plugin call, see [`PluginManager::call_plugin`].
pub struct PluginCall<'m, C: ?Sized, R> {
    manager: &'m PluginManager,
    method: String,
    invoke: Box<dyn Fn(&C) -> anyhow::Result<R> + 'm>,
    required: Vec<CapabilityTag>,
    sorting_context: Option<String>,
    on_success: Option<SuccessCallback<'m, C, R>>,
    on_error: Option<ErrorCallback<'m, C>>,
}

impl<'m, C: Capability + ?Sized, R> PluginCall<'m, C, R> {
    /// Only call plugins that also provide `tag`.
    pub fn requiring(mut self, tag: CapabilityTag) -> Self {
        self.required.push(tag);
        self
    }

    /// Order plugins using the rank overrides of `context`.
    pub fn sorting_context(mut self, context: impl Into<String>) -> Self {
        self.sorting_context = Some(context.into());
        self
    }

    /// Called with each successful result.
    ///
    /// An error returned here aborts the remaining calls and surfaces as
    /// [`PluginError::Callback`].
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str, &Arc<C>, R) -> anyhow::Result<()> + 'm,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Called for each failed plugin.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str, &Arc<C>, &CallFailure) + 'm,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Call every matching plugin in dispatch order.
    pub fn run(mut self) -> PluginResult<CallReport> {
        let mut tags = vec![CapabilityTag::of::<C>()];
        tags.extend(self.required.iter().copied());

        let implementations = self.manager.get_implementations(&tags, self.sorting_context.as_deref())?;
        let mut report = CallReport::default();

        for implementation in implementations {
            let identifier = implementation.identifier();
            let Some(plugin) = implementation.get::<C>() else {
                continue;
            };

            report.called.push(identifier.to_string());
            let invoke = &self.invoke;
            let failure = match catch_unwind(AssertUnwindSafe(|| invoke(&*plugin))) {
                Ok(Ok(result)) => {
                    report.succeeded.push(identifier.to_string());
                    if let Some(callback) = self.on_success.as_mut() {
                        callback(identifier, &plugin, result).map_err(|source| PluginError::Callback {
                            plugin: identifier.to_string(),
                            source,
                        })?;
                    }
                    continue;
                }
                Ok(Err(error)) => CallFailure::Error(error),
                Err(panic) => CallFailure::Panic(panic_message(panic.as_ref())),
            };

            tracing::error!(plugin = %identifier, capability = C::NAME, method = %self.method, error = %failure, "Error while calling plugin");
            report.failed.push(identifier.to_string());
            if let Some(callback) = self.on_error.as_mut() {
                callback(identifier, &plugin, &failure);
            }
        }

        Ok(report)
    }
}
