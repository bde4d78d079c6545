//! `HostConfig`: the single TOML-loadable configuration surface for a
//! running devhost process — shared-memory sizing, pipe timeouts, and
//! message-stream caps, each with defaults that match the component
//! design's own defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use devhost_errors::DevhostError;
use serde::{Deserialize, Serialize};

/// Shared-memory sizing and watchdog thresholds, mirrored from
/// [`devhost_shmem::SharedMemoryManagerConfig`] so they can round-trip
/// through TOML without pulling tokio types into the config surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedMemoryConfig {
    pub map_name: String,
    pub max_total_bytes: u64,
    pub default_segment_bytes: u64,
    pub min_segment_bytes: u64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub medium_threshold: f64,
    pub watchdog_interval_ms: u64,
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self {
            map_name: "devhost-shared-memory".to_string(),
            max_total_bytes: devhost_abi::DEFAULT_MAX_TOTAL_BYTES as u64,
            default_segment_bytes: devhost_abi::DEFAULT_DEFAULT_SEGMENT_BYTES as u64,
            min_segment_bytes: devhost_abi::DEFAULT_MIN_SEGMENT_BYTES as u64,
            warning_threshold: devhost_abi::DEFAULT_WARNING_THRESHOLD,
            critical_threshold: devhost_abi::DEFAULT_CRITICAL_THRESHOLD,
            medium_threshold: devhost_abi::DEFAULT_MEDIUM_THRESHOLD,
            watchdog_interval_ms: 1_000,
        }
    }
}

impl SharedMemoryConfig {
    pub fn to_manager_config(&self) -> devhost_shmem::SharedMemoryManagerConfig {
        devhost_shmem::SharedMemoryManagerConfig {
            map_name: self.map_name.clone(),
            max_total_bytes: self.max_total_bytes,
            default_segment_bytes: self.default_segment_bytes,
            min_segment_bytes: self.min_segment_bytes,
            warning_threshold: self.warning_threshold,
            critical_threshold: self.critical_threshold,
            medium_threshold: self.medium_threshold,
            watchdog_interval: Duration::from_millis(self.watchdog_interval_ms),
            unix_file_path: None,
            use_file_backed_on_unix: true,
        }
    }
}

/// Pipe round-trip timeouts, one per message type in the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeTimeoutsConfig {
    pub connect_ms: u64,
    pub ready_ms: u64,
    pub apply_segment_ms: u64,
    pub connect_request_ms: u64,
    pub disconnect_ms: u64,
    pub passthrough_ms: u64,
    pub shutdown_ms: u64,
}

impl Default for PipeTimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_ms: 3_000,
            ready_ms: 3_000,
            apply_segment_ms: 2_000,
            connect_request_ms: 10_000,
            disconnect_ms: 5_000,
            passthrough_ms: 10_000,
            shutdown_ms: 1_000,
        }
    }
}

impl PipeTimeoutsConfig {
    pub fn ready(&self) -> Duration {
        Duration::from_millis(self.ready_ms)
    }
    pub fn apply_segment(&self) -> Duration {
        Duration::from_millis(self.apply_segment_ms)
    }
    pub fn connect_request(&self) -> Duration {
        Duration::from_millis(self.connect_request_ms)
    }
    pub fn disconnect(&self) -> Duration {
        Duration::from_millis(self.disconnect_ms)
    }
    pub fn passthrough(&self) -> Duration {
        Duration::from_millis(self.passthrough_ms)
    }
    pub fn shutdown(&self) -> Duration {
        Duration::from_millis(self.shutdown_ms)
    }
}

/// Message-stream caps and the pump's backoff interval under backpressure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageStreamConfig {
    pub max_messages_per_session: usize,
    pub backpressure_backoff_ms: u64,
}

impl Default for MessageStreamConfig {
    fn default() -> Self {
        Self {
            max_messages_per_session: devhost_streams::DEFAULT_MAX_MESSAGES,
            backpressure_backoff_ms: 5,
        }
    }
}

/// Top-level configuration for one devhost process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub shared_memory: SharedMemoryConfig,
    pub pipe_timeouts: PipeTimeoutsConfig,
    pub message_stream: MessageStreamConfig,
}

impl HostConfig {
    /// Loads a TOML file at `path`, falling back to defaults (and writing
    /// them back out) when the file does not yet exist.
    pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Self, DevhostError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "host config not found, writing defaults");
            let config = Self::default();
            config.save_to_path(path).await?;
            return Ok(config);
        }

        let text = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&text).map_err(|e| DevhostError::protocol(format!("invalid host config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), DevhostError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| DevhostError::protocol(format!("cannot serialize host config: {e}")))?;
        tokio::fs::write(path, text).await?;
        Ok(())
    }

    /// Default config file location: `${TMPDIR}/devhost/host.toml` on
    /// Unix, `%LOCALAPPDATA%\devhost\host.toml` on Windows, matching the
    /// shared mapping's own default backing directory.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        if cfg!(windows) {
            let base = std::env::var("LOCALAPPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(base).join("devhost").join("host.toml")
        } else {
            let base = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(base).join("devhost").join("host.toml")
        }
    }

    pub fn validate(&self) -> Result<(), DevhostError> {
        if self.shared_memory.max_total_bytes == 0 {
            return Err(DevhostError::invalid_argument("shared_memory.max_total_bytes must be greater than 0"));
        }
        if self.shared_memory.min_segment_bytes > self.shared_memory.default_segment_bytes {
            return Err(DevhostError::invalid_argument(
                "shared_memory.min_segment_bytes must not exceed default_segment_bytes",
            ));
        }
        if !(0.0..1.0).contains(&self.shared_memory.medium_threshold)
            || !(0.0..1.0).contains(&self.shared_memory.warning_threshold)
            || !(0.0..=1.0).contains(&self.shared_memory.critical_threshold)
        {
            return Err(DevhostError::invalid_argument("backpressure thresholds must lie within [0, 1]"));
        }
        if self.shared_memory.medium_threshold >= self.shared_memory.warning_threshold
            || self.shared_memory.warning_threshold >= self.shared_memory.critical_threshold
        {
            return Err(DevhostError::invalid_argument("backpressure thresholds must be strictly increasing"));
        }
        if self.message_stream.max_messages_per_session == 0 {
            return Err(DevhostError::invalid_argument("message_stream.max_messages_per_session must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(HostConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_increasing_thresholds() {
        let mut config = HostConfig::default();
        config.shared_memory.warning_threshold = 0.5;
        config.shared_memory.medium_threshold = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_undersized_default_segment() {
        let mut config = HostConfig::default();
        config.shared_memory.min_segment_bytes = config.shared_memory.default_segment_bytes + 1;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn round_trips_through_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("host.toml");

        let loaded = HostConfig::load_from_path(&path).await.expect("write default then load");
        assert_eq!(loaded.shared_memory.map_name, "devhost-shared-memory");

        let reloaded = HostConfig::load_from_path(&path).await.expect("reload existing file");
        assert_eq!(reloaded.message_stream.max_messages_per_session, loaded.message_stream.max_messages_per_session);
    }
}
