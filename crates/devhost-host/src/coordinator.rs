//! `DeviceSessionCoordinator`: the binding layer between the supervisor,
//! the shared-memory manager, and the plugin protocol. Owns the
//! registry of live [`Session`] records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devhost_abi::{message_type, PipeRequest, PluginCapability, SessionDescriptor, SessionStatus};
use devhost_errors::DevhostError;
use devhost_shmem::SharedMemoryManager;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::event_bus::{EventBus, HostEvent, SessionClosedEvent, SessionCreatedEvent};
use crate::registry::PluginRegistry;
use crate::runtime::SessionHostRuntime;

const APPLY_SEGMENT_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_SEGMENT_BYTES: u64 = 256 * 1024;

/// A live binding of one capability instance to one allocated segment
/// and one set of parameters.
pub struct Session {
    pub id: String,
    pub name: String,
    pub plugin_id: String,
    pub capability_id: String,
    pub parameters: Value,
    pub status: RwLock<SessionStatus>,
    pub rx_bytes: AtomicU64,
    pub tx_bytes: AtomicU64,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }
}

pub struct DeviceSessionCoordinator {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    name_counters: Mutex<HashMap<String, u64>>,
    shared_memory: SharedMemoryManager,
    registry: Arc<PluginRegistry>,
    events: Arc<EventBus<HostEvent>>,
}

impl DeviceSessionCoordinator {
    #[must_use]
    pub fn new(shared_memory: SharedMemoryManager, registry: Arc<PluginRegistry>, events: Arc<EventBus<HostEvent>>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            name_counters: Mutex::new(HashMap::new()),
            shared_memory,
            registry,
            events,
        }
    }

    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(session_id).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    fn generate_name(&self, capability_id: &str) -> String {
        let mut counters = self.name_counters.lock();
        let next = counters.entry(capability_id.to_string()).or_insert(0);
        *next += 1;
        format!("{capability_id} #{next}")
    }

    /// Allocates a segment, hands it to the plugin, then asks it to
    /// `connect`. Releases the segment and surfaces the error if either
    /// pipe call fails.
    pub async fn connect(
        &self,
        runtime: Arc<SessionHostRuntime>,
        plugin_id: &str,
        capability_id: &str,
        session_id: &str,
        name: Option<String>,
        parameters: Value,
    ) -> Result<Arc<Session>, DevhostError> {
        let capability = self.registry.capability(plugin_id, capability_id)?;
        let name = name.unwrap_or_else(|| self.generate_name(capability_id));

        let session = Arc::new(Session {
            id: session_id.to_string(),
            name,
            plugin_id: plugin_id.to_string(),
            capability_id: capability_id.to_string(),
            parameters: parameters.clone(),
            status: RwLock::new(SessionStatus::Connecting),
            rx_bytes: AtomicU64::new(0),
            tx_bytes: AtomicU64::new(0),
            started_at: chrono::Utc::now(),
        });

        if let Err(err) = self.allocate_and_handshake(&runtime, &capability, session_id, capability_id, &parameters).await {
            *session.status.write() = SessionStatus::Failed;
            return Err(err);
        }

        *session.status.write() = SessionStatus::Connected;
        self.sessions.write().insert(session_id.to_string(), session.clone());
        self.events.publish(HostEvent::SessionCreated(SessionCreatedEvent {
            session_id: session_id.to_string(),
            plugin_id: plugin_id.to_string(),
            capability_id: capability_id.to_string(),
        }));

        Ok(session)
    }

    async fn allocate_and_handshake(
        &self,
        runtime: &SessionHostRuntime,
        capability: &PluginCapability,
        session_id: &str,
        capability_id: &str,
        parameters: &Value,
    ) -> Result<(), DevhostError> {
        let preferred = if capability.preferred_segment_bytes() > 0 {
            capability.preferred_segment_bytes()
        } else {
            FALLBACK_SEGMENT_BYTES
        };

        self.shared_memory
            .allocate_segment_async(session_id, preferred)
            .map_err(|e| DevhostError::invalid_argument(e.to_string()))?;

        let release_on_failure = |err: DevhostError| {
            self.shared_memory.release_segment(session_id);
            err
        };

        let descriptor = self
            .shared_memory
            .try_get_segment_descriptor(session_id)
            .map_err(|e| release_on_failure(DevhostError::invalid_argument(e.to_string())))?;

        let apply_payload = serde_json::to_value(&descriptor)
            .map_err(|e| release_on_failure(DevhostError::protocol(format!("serialize segment descriptor: {e}"))))?;

        let client = runtime.client();
        let apply_request = PipeRequest::new(
            message_type::APPLY_SHARED_MEMORY_SEGMENT,
            Some(session_id.to_string()),
            Some(apply_payload),
        );
        self.send_or_release(&client, apply_request, APPLY_SEGMENT_TIMEOUT, session_id, "apply shared memory segment")
            .await?;

        let connect_payload = serde_json::json!({
            "capability_id": capability_id,
            "parameters": parameters,
        });
        let connect_request = PipeRequest::new(message_type::CONNECT, Some(session_id.to_string()), Some(connect_payload));
        self.send_or_release(&client, connect_request, CONNECT_TIMEOUT, session_id, "connect")
            .await?;

        Ok(())
    }

    async fn send_or_release(
        &self,
        client: &Arc<devhost_ipc::PipeClient>,
        request: PipeRequest,
        timeout: Duration,
        session_id: &str,
        action: &str,
    ) -> Result<(), DevhostError> {
        match client.send(request, timeout).await {
            Ok(Some(response)) if response.ok => Ok(()),
            Ok(Some(response)) => {
                self.shared_memory.release_segment(session_id);
                Err(DevhostError::invalid_argument(format!("{action} rejected: {}", response.error.unwrap_or_default())))
            }
            Ok(None) => {
                self.shared_memory.release_segment(session_id);
                Err(DevhostError::Timeout(timeout))
            }
            Err(err) => {
                self.shared_memory.release_segment(session_id);
                Err(DevhostError::invalid_argument(format!("{action} failed: {err}")))
            }
        }
    }

    /// Removes a session, best-effort notifies the plugin, releases its
    /// segment, and emits `SessionClosedEvent`. Never fails: teardown
    /// runs through to completion regardless of pipe errors.
    pub async fn disconnect(&self, runtime: Option<Arc<SessionHostRuntime>>, session_id: &str, reason: Option<String>) {
        let Some(session) = self.sessions.write().remove(session_id) else {
            return;
        };
        *session.status.write() = SessionStatus::Disconnected;

        if let Some(runtime) = runtime {
            let request = PipeRequest::new(message_type::DISCONNECT, Some(session_id.to_string()), None);
            let _ = runtime.client().send(request, DISCONNECT_TIMEOUT).await;
        }

        self.shared_memory.release_segment(session_id);
        self.events.publish(HostEvent::SessionClosed(SessionClosedEvent {
            session_id: session_id.to_string(),
            reason,
        }));
    }

    /// Restores a session from a persisted descriptor, replaying its
    /// parameters verbatim into `connect`.
    pub async fn reconnect(
        &self,
        runtime: Arc<SessionHostRuntime>,
        descriptor: &SessionDescriptor,
    ) -> Result<Arc<Session>, DevhostError> {
        self.connect(
            runtime,
            &descriptor.plugin_id,
            &descriptor.capability_id,
            &descriptor.id,
            Some(descriptor.name.clone()),
            descriptor.parameters(),
        )
        .await
    }

    pub fn record_received(&self, session_id: &str, byte_len: u64) {
        if let Some(session) = self.get(session_id) {
            session.rx_bytes.fetch_add(byte_len, Ordering::Relaxed);
        }
    }

    pub fn record_sent(&self, session_id: &str, byte_len: u64) {
        if let Some(session) = self.get(session_id) {
            session.tx_bytes.fetch_add(byte_len, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devhost_shmem::SharedMemoryManagerConfig;
    use std::collections::HashMap as StdHashMap;

    fn shared_memory() -> SharedMemoryManager {
        SharedMemoryManager::new(SharedMemoryManagerConfig {
            map_name: "coordinator-test-map".to_string(),
            max_total_bytes: 256 * 1024,
            default_segment_bytes: 32 * 1024,
            min_segment_bytes: 8 * 1024,
            use_file_backed_on_unix: false,
            ..SharedMemoryManagerConfig::default()
        })
        .expect("manager")
    }

    fn registry_with_serial() -> Arc<PluginRegistry> {
        let registry = Arc::new(PluginRegistry::new());
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
        registry.register(devhost_abi::PluginDescriptor {
            id: "plugin.serial".to_string(),
            name: "Serial Plugin".to_string(),
            capabilities,
        });
        registry
    }

    #[test]
    fn generated_names_increment_per_capability() {
        let coordinator = DeviceSessionCoordinator::new(shared_memory(), registry_with_serial(), Arc::new(EventBus::new()));
        assert_eq!(coordinator.generate_name("serial"), "serial #1");
        assert_eq!(coordinator.generate_name("serial"), "serial #2");
        assert_eq!(coordinator.generate_name("tcp"), "tcp #1");
    }

    #[test]
    fn byte_counters_are_no_ops_for_unknown_sessions() {
        let coordinator = DeviceSessionCoordinator::new(shared_memory(), registry_with_serial(), Arc::new(EventBus::new()));
        coordinator.record_received("ghost", 10);
        assert!(coordinator.get("ghost").is_none());
    }

    #[tokio::test]
    async fn disconnecting_an_unknown_session_is_a_no_op() {
        let coordinator = DeviceSessionCoordinator::new(shared_memory(), registry_with_serial(), Arc::new(EventBus::new()));
        coordinator.disconnect(None, "ghost", None).await;
        assert!(coordinator.list().is_empty());
    }
}
