//! `SessionHostSupervisor`: spawns, reuses, and tears down per-session
//! (or per-capability) plugin host processes, enforcing one session per
//! process unless the capability opts into sharing one.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use devhost_abi::{message_type, PipeRequest};
use devhost_errors::DevhostError;
use devhost_ipc::{derive_pipe_name, group_key, PipeClient, PipeName};
use parking_lot::Mutex;
use tokio::process::Command;

use crate::runtime::SessionHostRuntime;

/// Everything the supervisor needs to spawn a given plugin's host
/// process. The plugin path and entry symbol come from the plugin's
/// published descriptor; the host executable is configured once per
/// devhost deployment.
#[derive(Debug, Clone)]
pub struct PluginLaunchSpec {
    pub host_executable: PathBuf,
    pub plugin_path: String,
    pub entry_symbol: String,
    pub host_token: String,
}

struct HostGroup {
    runtime: Arc<SessionHostRuntime>,
    sessions: HashSet<String>,
}

pub struct SessionHostSupervisor {
    groups: Mutex<HashMap<String, HostGroup>>,
    session_to_key: Mutex<HashMap<String, String>>,
    ready_timeout: Duration,
}

impl SessionHostSupervisor {
    #[must_use]
    pub fn new(ready_timeout: Duration) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            session_to_key: Mutex::new(HashMap::new()),
            ready_timeout,
        }
    }

    /// Ensures a host process is running for the session's group,
    /// spawning one if necessary, and returns the shared runtime. Holds
    /// its internal lock only for constant-time map updates — the spawn
    /// and readiness handshake run lock-free, so a concurrent caller for
    /// the same key may race it; the loser's runtime is disposed and the
    /// incumbent is returned to both callers.
    pub async fn ensure_started(
        &self,
        plugin_id: &str,
        capability_id: &str,
        session_id: &str,
        supports_multi_session: bool,
        spec: &PluginLaunchSpec,
    ) -> Result<Arc<SessionHostRuntime>, DevhostError> {
        let key = group_key(plugin_id, capability_id, session_id, supports_multi_session);

        if let Some(runtime) = self.live_group(&key).await {
            self.register_session(&key, session_id);
            return Ok(runtime);
        }

        let runtime = Arc::new(
            self.spawn_and_handshake(plugin_id, &key, session_id, supports_multi_session, spec)
                .await?,
        );
        let winner = self.insert_or_yield_to_incumbent(&key, runtime.clone());
        if !Arc::ptr_eq(&winner, &runtime) {
            tracing::debug!(key, "lost session host spawn race, disposing the loser");
            runtime.dispose().await;
        }
        self.register_session(&key, session_id);
        Ok(winner)
    }

    /// Returns the group's runtime if one exists and is still alive,
    /// removing and disposing it first if it has died.
    async fn live_group(&self, key: &str) -> Option<Arc<SessionHostRuntime>> {
        let candidate = self.groups.lock().get(key).map(|g| g.runtime.clone());
        let runtime = candidate?;
        if runtime.is_alive().await {
            return Some(runtime);
        }
        self.groups.lock().remove(key);
        runtime.dispose().await;
        None
    }

    fn insert_or_yield_to_incumbent(&self, key: &str, candidate: Arc<SessionHostRuntime>) -> Arc<SessionHostRuntime> {
        let mut groups = self.groups.lock();
        if let Some(existing) = groups.get(key) {
            return existing.runtime.clone();
        }
        groups.insert(key.to_string(), HostGroup { runtime: candidate.clone(), sessions: HashSet::new() });
        candidate
    }

    fn register_session(&self, key: &str, session_id: &str) {
        if let Some(group) = self.groups.lock().get_mut(key) {
            group.sessions.insert(session_id.to_string());
        }
        self.session_to_key.lock().insert(session_id.to_string(), key.to_string());
    }

    async fn spawn_and_handshake(
        &self,
        plugin_id: &str,
        key: &str,
        session_id: &str,
        supports_multi_session: bool,
        spec: &PluginLaunchSpec,
    ) -> Result<SessionHostRuntime, DevhostError> {
        let pipe_name = derive_pipe_name(plugin_id, key);
        tracing::info!(plugin_id, key, pipe_name, "spawning session host process");

        let mut command = Command::new(&spec.host_executable);
        command
            .arg("--pipe")
            .arg(&pipe_name)
            .arg("--plugin")
            .arg(&spec.plugin_path)
            .arg("--entry")
            .arg(&spec.entry_symbol)
            .arg("--host-token")
            .arg(&spec.host_token)
            .arg("--role")
            .arg("session")
            .arg("--parent-pid")
            .arg(std::process::id().to_string());

        if !supports_multi_session {
            command.arg("--session-id").arg(session_id);
        }

        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let client = Arc::new(PipeClient::new(PipeName::new(&pipe_name), self.ready_timeout));
        let ping = PipeRequest::new(message_type::PING, None, None);
        let response = client.send(ping, self.ready_timeout).await;
        let runtime = SessionHostRuntime::new(child, client);

        match response {
            Ok(Some(r)) if r.ok => Ok(runtime),
            Ok(Some(r)) => {
                runtime.dispose().await;
                Err(DevhostError::invalid_argument(format!(
                    "session host for '{plugin_id}' rejected readiness ping: {}",
                    r.error.unwrap_or_default()
                )))
            }
            Ok(None) => {
                runtime.dispose().await;
                Err(DevhostError::Timeout(self.ready_timeout))
            }
            Err(err) => {
                runtime.dispose().await;
                Err(DevhostError::invalid_argument(format!("session host for '{plugin_id}' failed to connect: {err}")))
            }
        }
    }

    /// Removes `session_id` from its group; if the group becomes empty,
    /// shuts the host process down.
    pub async fn stop(&self, session_id: &str, timeout: Duration) {
        let Some(key) = self.session_to_key.lock().remove(session_id) else {
            return;
        };

        let emptied_runtime = {
            let mut groups = self.groups.lock();
            let Some(group) = groups.get_mut(&key) else {
                return;
            };
            group.sessions.remove(session_id);
            if group.sessions.is_empty() {
                groups.remove(&key).map(|g| g.runtime)
            } else {
                None
            }
        };

        if let Some(runtime) = emptied_runtime {
            tracing::info!(key, "session host group emptied, shutting it down");
            runtime.shutdown(timeout).await;
        }
    }

    #[must_use]
    pub fn active_group_count(&self) -> usize {
        self.groups.lock().len()
    }

    /// Returns the runtime backing `session_id`'s group, if any.
    #[must_use]
    pub fn runtime_for_session(&self, session_id: &str) -> Option<Arc<SessionHostRuntime>> {
        let key = self.session_to_key.lock().get(session_id).cloned()?;
        self.groups.lock().get(&key).map(|g| g.runtime.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_supervisor_has_no_groups() {
        let supervisor = SessionHostSupervisor::new(Duration::from_secs(1));
        assert_eq!(supervisor.active_group_count(), 0);
    }

    #[tokio::test]
    async fn stop_on_unknown_session_is_a_no_op() {
        let supervisor = SessionHostSupervisor::new(Duration::from_secs(1));
        supervisor.stop("ghost", Duration::from_millis(10)).await;
        assert_eq!(supervisor.active_group_count(), 0);
    }

    #[tokio::test]
    async fn ensure_started_surfaces_spawn_failure() {
        let supervisor = SessionHostSupervisor::new(Duration::from_millis(100));
        let spec = PluginLaunchSpec {
            host_executable: PathBuf::from("/nonexistent/devhost-plugin-host"),
            plugin_path: "plugin.so".to_string(),
            entry_symbol: "entry".to_string(),
            host_token: "token".to_string(),
        };
        let result = supervisor.ensure_started("plugin.serial", "serial", "s1", false, &spec).await;
        assert!(result.is_err());
        assert_eq!(supervisor.active_group_count(), 0);
    }
}
