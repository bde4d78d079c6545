//! `SessionHostRuntime`: a spawned plugin child process paired with the
//! pipe client that talks to it. One runtime is shared by every session
//! in its group.

use std::sync::Arc;
use std::time::Duration;

use devhost_abi::{message_type, PipeRequest};
use devhost_ipc::PipeClient;
use tokio::process::Child;
use tokio::sync::Mutex;

/// The cap the component design places on a polite shutdown request,
/// regardless of what timeout the caller passed in.
const POLITE_SHUTDOWN_CAP: Duration = Duration::from_secs(1);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct SessionHostRuntime {
    child: Mutex<Child>,
    client: Arc<PipeClient>,
}

impl SessionHostRuntime {
    #[must_use]
    pub fn new(child: Child, client: Arc<PipeClient>) -> Self {
        Self { child: Mutex::new(child), client }
    }

    #[must_use]
    pub fn client(&self) -> Arc<PipeClient> {
        self.client.clone()
    }

    /// True while the child process has not exited. A non-blocking
    /// `try_wait` — never polls longer than it takes to lock the child.
    pub async fn is_alive(&self) -> bool {
        match self.child.lock().await.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) | Err(_) => false,
        }
    }

    /// Best-effort polite shutdown: a `shutdown` request capped at 1 s,
    /// then waits up to `timeout` for the process to exit on its own,
    /// then kills the whole process if it hasn't. Safe to call more than
    /// once — a dead process is simply reported dead.
    pub async fn shutdown(&self, timeout: Duration) {
        if !self.is_alive().await {
            return;
        }

        let request = PipeRequest::new(message_type::SHUTDOWN, None, None);
        let _ = self.client.send(request, POLITE_SHUTDOWN_CAP).await;

        if self.wait_exit(timeout).await {
            return;
        }

        tracing::warn!("session host did not exit politely, killing process");
        self.kill().await;
    }

    /// Polls for exit until `timeout` elapses. Returns `true` if the
    /// process exited within the window.
    async fn wait_exit(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.is_alive().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    async fn kill(&self) {
        let mut child = self.child.lock().await;
        if let Err(err) = child.kill().await {
            tracing::warn!(error = %err, "failed to kill session host process");
        }
    }

    /// Disposes the pipe client, force-kills the process if it's still
    /// alive, and swallows any inner error — teardown must not fail.
    pub async fn dispose(&self) {
        self.client.dispose().await;
        if self.is_alive().await {
            self.kill().await;
        }
    }
}
