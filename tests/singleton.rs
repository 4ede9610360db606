//! The process-wide plugin manager.
//!
//! Kept in its own test binary so no other test touches the global.

use std::sync::Arc;

use hookhost::plugin::{CapabilityTable, EntryPoint, ManagerOptions, Plugin, PluginManifest};
use hookhost::{initialize, plugin_manager, PluginError};

struct Quiet;

impl Plugin for Quiet {
    fn implements(self: Arc<Self>, _table: &mut CapabilityTable) {}
}

#[test]
fn test_global_manager_initializes_once() {
    assert!(matches!(plugin_manager(), Err(PluginError::NotInitialized)));

    let options = ManagerOptions::default()
        .with_entry_point(EntryPoint::from_instance(PluginManifest::new("quiet"), Arc::new(Quiet)));
    let manager = initialize(options).unwrap();
    assert!(manager.is_initialized());

    let again = initialize(ManagerOptions::default());
    assert!(matches!(again, Err(PluginError::AlreadyInitialized)));

    let global = plugin_manager().unwrap();
    assert!(Arc::ptr_eq(&manager, &global));
    assert_eq!(global.plugins().unwrap().len(), 1);
}
