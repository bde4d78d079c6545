//! `PluginRegistry`: an in-memory catalog of plugin descriptors, letting
//! the dispatcher resolve a plugin id and its capability defaults
//! without any external configuration service.

use std::collections::HashMap;

use devhost_abi::{PluginCapability, PluginDescriptor};
use devhost_errors::DevhostError;
use parking_lot::RwLock;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, PluginDescriptor>>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a plugin's descriptor.
    pub fn register(&self, descriptor: PluginDescriptor) {
        tracing::debug!(plugin_id = %descriptor.id, capabilities = descriptor.capabilities.len(), "plugin registered");
        self.plugins.write().insert(descriptor.id.clone(), descriptor);
    }

    pub fn unregister(&self, plugin_id: &str) {
        self.plugins.write().remove(plugin_id);
    }

    #[must_use]
    pub fn get(&self, plugin_id: &str) -> Option<PluginDescriptor> {
        self.plugins.read().get(plugin_id).cloned()
    }

    /// Resolves `capability_id` within `plugin_id`, falling back to a
    /// default capability named after the plugin itself when
    /// `capability_id` is omitted (mirrors the dispatcher's "default =
    /// plugin id" convention for `connect`).
    pub fn capability(&self, plugin_id: &str, capability_id: &str) -> Result<PluginCapability, DevhostError> {
        let plugins = self.plugins.read();
        let descriptor = plugins
            .get(plugin_id)
            .ok_or_else(|| DevhostError::not_found(format!("plugin '{plugin_id}' is not registered")))?;
        descriptor
            .capabilities
            .get(capability_id)
            .cloned()
            .ok_or_else(|| DevhostError::not_found(format!("plugin '{plugin_id}' has no capability '{capability_id}'")))
    }

    #[must_use]
    pub fn list(&self) -> Vec<PluginDescriptor> {
        self.plugins.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn descriptor(id: &str) -> PluginDescriptor {
        let mut capabilities = StdHashMap::new();
        capabilities.insert(
            "serial".to_string(),
            PluginCapability {
                id: "serial".to_string(),
                name: "Serial".to_string(),
                description: None,
                json_schema: None,
                ui_schema: None,
                default_parameters_text: None,
                supports_multi_session: false,
                shared_memory_request: None,
            },
        );
        PluginDescriptor { id: id.to_string(), name: id.to_string(), capabilities }
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = PluginRegistry::new();
        registry.register(descriptor("plugin.serial"));
        assert!(registry.get("plugin.serial").is_some());
        assert!(registry.get("plugin.missing").is_none());
    }

    #[test]
    fn capability_resolves_nested_entry() {
        let registry = PluginRegistry::new();
        registry.register(descriptor("plugin.serial"));
        let cap = registry.capability("plugin.serial", "serial").expect("capability");
        assert_eq!(cap.id, "serial");
        assert!(registry.capability("plugin.serial", "tcp").is_err());
        assert!(registry.capability("plugin.missing", "serial").is_err());
    }

    #[test]
    fn unregister_removes_the_plugin() {
        let registry = PluginRegistry::new();
        registry.register(descriptor("plugin.serial"));
        registry.unregister("plugin.serial");
        assert!(registry.get("plugin.serial").is_none());
    }
}
