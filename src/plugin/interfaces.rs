//! Capabilities the host knows about out of the box.
//!
//! Hosts add their own capabilities the same way: a `Send + Sync` trait plus
//! an `impl Capability for dyn Trait`.

use serde_json::Value;

use super::Capability;
use crate::settings::Preprocessors;

/// Plugins that want to run code when the host starts up.
pub trait StartupPlugin: Send + Sync {
    /// Called before the host starts serving on `host:port`.
    fn on_startup(&self, host: &str, port: u16) -> anyhow::Result<()> {
        let _ = (host, port);
        Ok(())
    }

    /// Called once the host is fully up.
    fn on_after_startup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl Capability for dyn StartupPlugin {
    const NAME: &'static str = "startup";
}

/// Plugins that want to clean up when the host shuts down.
pub trait ShutdownPlugin: Send + Sync {
    fn on_shutdown(&self) -> anyhow::Result<()>;
}

impl Capability for dyn ShutdownPlugin {
    const NAME: &'static str = "shutdown";
}

/// Plugins that store settings.
pub trait SettingsPlugin: Send + Sync {
    /// Default subtree below `plugins.<identifier>`.
    fn settings_defaults(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Get and set preprocessors, keyed by plugin-relative path.
    fn settings_preprocessors(&self) -> anyhow::Result<(Preprocessors, Preprocessors)> {
        Ok((Preprocessors::new(), Preprocessors::new()))
    }

    /// Current settings layout version, `None` if the plugin does not version.
    fn settings_version(&self) -> Option<i64> {
        None
    }

    /// Bring stored settings from `current` up to `target`.
    fn on_settings_migrate(&self, target: i64, current: Option<i64>) -> anyhow::Result<()> {
        let _ = (target, current);
        Ok(())
    }
}

impl Capability for dyn SettingsPlugin {
    const NAME: &'static str = "settings";
}
