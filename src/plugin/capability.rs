//! Capability interfaces and the per-instance capability table.
//!
//! A capability is a trait object type such as `dyn StartupPlugin`. Host
//! crates add their own by implementing [`Capability`] for `dyn TheirTrait`.
//! A plugin instance lists the capabilities it satisfies once, when it is
//! activated, by handing out `Arc<dyn Trait>` views of itself:
//!
//! ```
//! use std::sync::Arc;
//! use hookhost::plugin::{Capability, CapabilityTable, Plugin};
//!
//! pub trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! impl Capability for dyn Greeter {
//!     const NAME: &'static str = "greeter";
//! }
//!
//! struct Hello;
//!
//! impl Greeter for Hello {
//!     fn greet(&self, name: &str) -> String {
//!         format!("hello {name}")
//!     }
//! }
//!
//! impl Plugin for Hello {
//!     fn implements(self: Arc<Self>, table: &mut CapabilityTable) {
//!         table.provide::<dyn Greeter>(self);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Marker for trait object types usable as capabilities.
pub trait Capability: Send + Sync + 'static {
    /// Name used in logs and status output.
    const NAME: &'static str;
}

/// Identity of a capability.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityTag {
    id: TypeId,
    name: &'static str,
}

impl CapabilityTag {
    /// The tag of capability `C`.
    pub fn of<C: Capability + ?Sized>() -> Self {
        Self { id: TypeId::of::<C>(), name: C::NAME }
    }

    /// The capability name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for CapabilityTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CapabilityTag {}

impl std::hash::Hash for CapabilityTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone)]
struct HookSlot {
    handler_type: TypeId,
    handler: Arc<dyn Any + Send + Sync>,
}

/// Capability views and hook handlers of one plugin instance.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    capabilities: HashMap<CapabilityTag, Arc<dyn Any + Send + Sync>>,
    order: Vec<CapabilityTag>,
    hooks: HashMap<String, HookSlot>,
}

impl std::fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("capabilities", &self.order.iter().map(CapabilityTag::name).collect::<Vec<_>>())
            .field("hooks", &self.hook_namespaces())
            .finish()
    }
}

impl CapabilityTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `implementation` as the view for capability `C`.
    pub fn provide<C: Capability + ?Sized>(&mut self, implementation: Arc<C>) -> &mut Self {
        let tag = CapabilityTag::of::<C>();
        if self.capabilities.insert(tag, Arc::new(implementation)).is_none() {
            self.order.push(tag);
        }
        self
    }

    /// Register a handler for a hook namespace.
    ///
    /// `H` is usually a closure trait object such as
    /// `dyn Fn(&str) -> String + Send + Sync`; lookups must name the same type.
    pub fn hook<H: ?Sized + Send + Sync + 'static>(
        &mut self,
        namespace: impl Into<String>,
        handler: Arc<H>,
    ) -> &mut Self {
        self.hooks.insert(
            namespace.into(),
            HookSlot { handler_type: TypeId::of::<H>(), handler: Arc::new(handler) },
        );
        self
    }

    /// The view for capability `C`, if provided.
    pub fn get<C: Capability + ?Sized>(&self) -> Option<Arc<C>> {
        self.capabilities
            .get(&CapabilityTag::of::<C>())
            .and_then(|any| (**any).downcast_ref::<Arc<C>>())
            .cloned()
    }

    /// The handler for `namespace`, if one of type `H` was registered.
    pub fn hook_handler<H: ?Sized + Send + Sync + 'static>(&self, namespace: &str) -> Option<Arc<H>> {
        let slot = self.hooks.get(namespace)?;
        if slot.handler_type != TypeId::of::<H>() {
            return None;
        }
        (*slot.handler).downcast_ref::<Arc<H>>().cloned()
    }

    /// Whether capability `tag` was provided.
    pub fn contains(&self, tag: &CapabilityTag) -> bool {
        self.capabilities.contains_key(tag)
    }

    /// Whether every tag in `tags` was provided.
    pub fn satisfies(&self, tags: &[CapabilityTag]) -> bool {
        tags.iter().all(|tag| self.contains(tag))
    }

    /// Provided capabilities, in registration order.
    pub fn tags(&self) -> &[CapabilityTag] {
        &self.order
    }

    /// Hook namespaces with a registered handler, sorted.
    pub fn hook_namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        namespaces.sort_unstable();
        namespaces
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty() && self.hooks.is_empty()
    }
}

/// Trait that every plugin implementation satisfies.
pub trait Plugin: Send + Sync + 'static {
    /// Declare the capabilities (and hook handlers) of this instance.
    fn implements(self: Arc<Self>, table: &mut CapabilityTable);

    /// Called once after the instance was activated under `identifier`.
    ///
    /// An error rejects the plugin.
    fn on_loaded(&self, identifier: &str) -> anyhow::Result<()> {
        let _ = identifier;
        Ok(())
    }
}
