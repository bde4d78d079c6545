//! `CapabilityDispatcher`: thin router between high-level UI/controller
//! actions and the device session coordinator.

use std::sync::Arc;
use std::time::Duration;

use devhost_abi::{PipeRequest, SchemaLiteValidator};
use devhost_errors::DevhostError;
use serde_json::Value;

use crate::coordinator::{DeviceSessionCoordinator, Session};
use crate::registry::PluginRegistry;
use crate::supervisor::{PluginLaunchSpec, SessionHostSupervisor};

const PASSTHROUGH_TIMEOUT: Duration = Duration::from_secs(10);

pub const CONNECT_ACTION: &str = "connect";
pub const DISCONNECT_ACTION: &str = "disconnect";

pub struct CapabilityDispatcher {
    registry: Arc<PluginRegistry>,
    supervisor: Arc<SessionHostSupervisor>,
    coordinator: Arc<DeviceSessionCoordinator>,
}

impl CapabilityDispatcher {
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>, supervisor: Arc<SessionHostSupervisor>, coordinator: Arc<DeviceSessionCoordinator>) -> Self {
        Self { registry, supervisor, coordinator }
    }

    /// Dispatches `action` against the plugin/session pair. At least one
    /// of `plugin_id` or `session_id` must be resolvable.
    pub async fn dispatch(
        &self,
        plugin_id: Option<&str>,
        session_id: Option<&str>,
        action: &str,
        parameters: Option<Value>,
        spec: Option<&PluginLaunchSpec>,
    ) -> Result<Value, DevhostError> {
        let resolved_plugin_id = self.resolve_plugin_id(plugin_id, session_id)?;

        match action {
            CONNECT_ACTION => self.dispatch_connect(&resolved_plugin_id, session_id, parameters, spec).await,
            DISCONNECT_ACTION => self.dispatch_disconnect(session_id).await,
            other => self.dispatch_passthrough(&resolved_plugin_id, session_id, other, parameters).await,
        }
    }

    fn resolve_plugin_id(&self, plugin_id: Option<&str>, session_id: Option<&str>) -> Result<String, DevhostError> {
        if let Some(id) = plugin_id {
            return Ok(id.to_string());
        }
        let session_id = session_id.ok_or_else(|| DevhostError::invalid_argument("either plugin_id or session_id is required"))?;
        let session = self
            .coordinator
            .get(session_id)
            .ok_or_else(|| DevhostError::not_found(format!("session '{session_id}' not found")))?;
        Ok(session.plugin_id.clone())
    }

    async fn dispatch_connect(
        &self,
        plugin_id: &str,
        session_id: Option<&str>,
        parameters: Option<Value>,
        spec: Option<&PluginLaunchSpec>,
    ) -> Result<Value, DevhostError> {
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let spec = spec.ok_or_else(|| DevhostError::invalid_argument("connect requires a plugin launch spec"))?;

        let payload = parameters.unwrap_or(Value::Null);
        let (capability_id, params) = extract_capability_and_parameters(plugin_id, &payload);

        let capability = self.registry.capability(plugin_id, &capability_id)?;
        if let Some(schema) = &capability.json_schema {
            SchemaLiteValidator::new()
                .validate(schema, &params)
                .map_err(|reason| DevhostError::invalid_argument(format!("connect parameters rejected: {reason}")))?;
        }

        let runtime = self
            .supervisor
            .ensure_started(plugin_id, &capability_id, &session_id, capability.supports_multi_session, spec)
            .await?;

        let session = self
            .coordinator
            .connect(runtime, plugin_id, &capability_id, &session_id, None, params)
            .await?;

        Ok(session_summary(&session))
    }

    async fn dispatch_disconnect(&self, session_id: Option<&str>) -> Result<Value, DevhostError> {
        let session_id = session_id.ok_or_else(|| DevhostError::invalid_argument("disconnect requires session_id"))?;
        let runtime = self.supervisor.runtime_for_session(session_id);
        self.coordinator.disconnect(runtime, session_id, None).await;
        self.supervisor.stop(session_id, Duration::from_secs(5)).await;
        Ok(Value::Null)
    }

    async fn dispatch_passthrough(
        &self,
        plugin_id: &str,
        session_id: Option<&str>,
        action: &str,
        parameters: Option<Value>,
    ) -> Result<Value, DevhostError> {
        let _ = plugin_id;
        let session_id = session_id.ok_or_else(|| DevhostError::invalid_argument(format!("action '{action}' requires session_id")))?;
        let runtime = self
            .supervisor
            .runtime_for_session(session_id)
            .ok_or_else(|| DevhostError::not_found(format!("session '{session_id}' has no live host process")))?;

        let request = PipeRequest::new(action, Some(session_id.to_string()), parameters);
        match runtime.client().send(request, PASSTHROUGH_TIMEOUT).await {
            Ok(Some(response)) if response.ok => Ok(response.snapshot.unwrap_or(Value::Null)),
            Ok(Some(response)) => Err(DevhostError::plugin(response.error.unwrap_or_else(|| format!("action '{action}' failed")))),
            Ok(None) => Err(DevhostError::Timeout(PASSTHROUGH_TIMEOUT)),
            Err(err) => Err(DevhostError::invalid_argument(format!("action '{action}' failed: {err}"))),
        }
    }
}

fn extract_capability_and_parameters(plugin_id: &str, payload: &Value) -> (String, Value) {
    if let Some(obj) = payload.as_object() {
        let capability_id = obj
            .get("capability_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| plugin_id.to_string());
        let parameters = obj.get("parameters").cloned().unwrap_or_else(|| payload.clone());
        (capability_id, parameters)
    } else {
        (plugin_id.to_string(), payload.clone())
    }
}

fn session_summary(session: &Session) -> Value {
    serde_json::json!({
        "session_id": session.id,
        "name": session.name,
        "plugin_id": session.plugin_id,
        "capability_id": session.capability_id,
        "status": session.status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use crate::registry::PluginRegistry;
    use devhost_abi::PluginCapability;
    use devhost_shmem::{SharedMemoryManager, SharedMemoryManagerConfig};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn flat_payload_defaults_capability_to_plugin_id() {
        let (capability_id, parameters) = extract_capability_and_parameters("plugin.serial", &json!({"port": "COM3"}));
        assert_eq!(capability_id, "plugin.serial");
        assert_eq!(parameters["port"], "COM3");
    }

    #[test]
    fn wrapped_payload_extracts_nested_parameters() {
        let payload = json!({"capability_id": "serial", "parameters": {"port": "COM3"}});
        let (capability_id, parameters) = extract_capability_and_parameters("plugin.serial", &payload);
        assert_eq!(capability_id, "serial");
        assert_eq!(parameters["port"], "COM3");
    }

    fn dispatcher_with_schema_capability() -> CapabilityDispatcher {
        let mut capabilities = HashMap::new();
        capabilities.insert(
            "serial".to_string(),
            PluginCapability {
                id: "serial".to_string(),
                name: "Serial".to_string(),
                description: None,
                json_schema: Some(json!({"required": ["port"], "properties": {"port": {"type": "string"}}})),
                ui_schema: None,
                default_parameters_text: None,
                supports_multi_session: false,
                shared_memory_request: None,
            },
        );
        let registry = Arc::new(PluginRegistry::new());
        registry.register(devhost_abi::PluginDescriptor {
            id: "plugin.serial".to_string(),
            name: "Serial Plugin".to_string(),
            capabilities,
        });

        let shared_memory = SharedMemoryManager::new(SharedMemoryManagerConfig {
            map_name: "dispatcher-test-map".to_string(),
            max_total_bytes: 256 * 1024,
            default_segment_bytes: 32 * 1024,
            min_segment_bytes: 8 * 1024,
            use_file_backed_on_unix: false,
            ..SharedMemoryManagerConfig::default()
        })
        .expect("manager");

        let events = Arc::new(EventBus::new());
        let coordinator = Arc::new(DeviceSessionCoordinator::new(shared_memory, registry.clone(), events));
        let supervisor = Arc::new(SessionHostSupervisor::new(Duration::from_secs(1)));
        CapabilityDispatcher::new(registry, supervisor, coordinator)
    }

    #[tokio::test]
    async fn connect_rejects_payload_failing_local_schema_validation() {
        let dispatcher = dispatcher_with_schema_capability();
        let spec = PluginLaunchSpec {
            host_executable: std::path::PathBuf::from("/nonexistent/devhost-plugin-host"),
            plugin_path: "plugin.so".to_string(),
            entry_symbol: "entry".to_string(),
            host_token: "token".to_string(),
        };

        let err = dispatcher
            .dispatch(Some("plugin.serial"), Some("s1"), CONNECT_ACTION, Some(json!({})), Some(&spec))
            .await
            .expect_err("missing required 'port' should fail local validation");

        assert!(err.to_string().contains("connect parameters rejected"));
    }
}
