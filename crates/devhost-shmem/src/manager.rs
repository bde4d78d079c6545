//! `SharedMemoryManager`: wraps [`SegmentedSharedMemory`] with lifecycle
//! management and a watchdog task that classifies backpressure per
//! segment on a fixed tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use devhost_abi::{BackpressureLevel, SegmentDescriptor, DEFAULT_CRITICAL_THRESHOLD, DEFAULT_MEDIUM_THRESHOLD, DEFAULT_WARNING_THRESHOLD};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::allocator::SegmentedSharedMemory;
use crate::error::ShmemError;
use crate::map::{MapFactory, MapOptions};
use crate::segment::SessionSegment;

/// Tunable sizing and threshold knobs, defaulted per the component's
/// configuration table.
#[derive(Debug, Clone)]
pub struct SharedMemoryManagerConfig {
    pub map_name: String,
    pub max_total_bytes: u64,
    pub default_segment_bytes: u64,
    pub min_segment_bytes: u64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub medium_threshold: f64,
    pub watchdog_interval: Duration,
    pub unix_file_path: Option<std::path::PathBuf>,
    pub use_file_backed_on_unix: bool,
}

impl Default for SharedMemoryManagerConfig {
    fn default() -> Self {
        Self {
            map_name: "devhost-shared-memory".to_string(),
            max_total_bytes: devhost_abi::DEFAULT_MAX_TOTAL_BYTES as u64,
            default_segment_bytes: devhost_abi::DEFAULT_DEFAULT_SEGMENT_BYTES as u64,
            min_segment_bytes: devhost_abi::DEFAULT_MIN_SEGMENT_BYTES as u64,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            medium_threshold: DEFAULT_MEDIUM_THRESHOLD,
            watchdog_interval: Duration::from_secs(1),
            unix_file_path: None,
            use_file_backed_on_unix: true,
        }
    }
}

/// Emitted by the watchdog task whenever a session's backpressure
/// classification changes from the previous tick.
#[derive(Debug, Clone)]
pub struct BackpressureDetected {
    pub session_id: String,
    pub level: BackpressureLevel,
    pub usage_ratio: f64,
}

struct SessionRecord {
    last_level: BackpressureLevel,
}

/// Lifecycle wrapper around [`SegmentedSharedMemory`] plus the watchdog
/// that classifies backpressure. Cloneable: internal state is `Arc`-held
/// so the watchdog task and callers share one allocator.
#[derive(Clone)]
pub struct SharedMemoryManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: SharedMemoryManagerConfig,
    allocator: SegmentedSharedMemory,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    events: broadcast::Sender<BackpressureDetected>,
    map_name: String,
    unix_file_path: Option<String>,
}

impl SharedMemoryManager {
    /// Creates the mapping per §4.1 and returns a manager ready to have
    /// [`Self::initialize`] start its watchdog task.
    pub fn new(config: SharedMemoryManagerConfig) -> Result<Self, ShmemError> {
        let factory = MapFactory::new();
        let options = MapOptions {
            name: config.map_name.clone(),
            capacity_bytes: config.max_total_bytes,
            unix_file_path: config.unix_file_path.clone(),
            use_file_backed_on_unix: config.use_file_backed_on_unix,
            delete_file_on_dispose: true,
        };
        let handle = factory.create(&options)?;
        let allocator = SegmentedSharedMemory::new(handle);
        let (events, _) = broadcast::channel(256);

        let unix_file_path = options
            .unix_file_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let map_name = config.map_name.clone();

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                allocator,
                sessions: RwLock::new(HashMap::new()),
                events,
                map_name,
                unix_file_path,
            }),
        })
    }

    /// Subscribes to backpressure transitions fired by the watchdog.
    pub fn subscribe(&self) -> broadcast::Receiver<BackpressureDetected> {
        self.inner.events.subscribe()
    }

    /// Starts the watchdog loop on the current Tokio runtime. Returns a
    /// handle the caller can abort on shutdown.
    pub fn initialize(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.inner.config.watchdog_interval);
            loop {
                ticker.tick().await;
                manager.tick_watchdog();
            }
        })
    }

    fn tick_watchdog(&self) {
        let session_ids: Vec<String> = self.inner.sessions.read().keys().cloned().collect();
        for session_id in session_ids {
            let Ok(segment) = self.inner.allocator.segment(&session_id) else {
                continue;
            };
            let usage_ratio = segment.usage_ratio();
            let level = BackpressureLevel::classify(
                usage_ratio,
                self.inner.config.medium_threshold,
                self.inner.config.warning_threshold,
                self.inner.config.critical_threshold,
            );

            let changed = {
                let mut sessions = self.inner.sessions.write();
                let Some(record) = sessions.get_mut(&session_id) else {
                    continue;
                };
                let changed = record.last_level != level;
                record.last_level = level;
                changed
            };

            if changed {
                if level == BackpressureLevel::High {
                    if usage_ratio > self.inner.config.critical_threshold {
                        tracing::error!(session_id, usage_ratio, "segment usage past critical threshold");
                    } else {
                        tracing::warn!(session_id, usage_ratio, "segment usage past warning threshold");
                    }
                }
                let _ = self.inner.events.send(BackpressureDetected {
                    session_id,
                    level,
                    usage_ratio,
                });
            }
        }
    }

    /// Allocates a segment for `session_id`, downgrading `requested_bytes`
    /// toward `min_segment_bytes` when remaining capacity is tight.
    pub fn allocate_segment_async(&self, session_id: &str, requested_bytes: u64) -> Result<SessionSegment, ShmemError> {
        let stats = self.inner.allocator.usage_stats();
        let size = if stats.remaining_bytes < requested_bytes {
            let downgraded = requested_bytes.max(self.inner.config.min_segment_bytes).min(stats.remaining_bytes);
            if downgraded < self.inner.config.min_segment_bytes {
                return Err(ShmemError::OutOfCapacity {
                    requested: requested_bytes,
                    remaining: stats.remaining_bytes,
                });
            }
            tracing::warn!(
                session_id,
                requested_bytes,
                downgraded,
                remaining = stats.remaining_bytes,
                "downgrading shared memory segment request to fit remaining capacity"
            );
            downgraded
        } else {
            requested_bytes
        };

        let segment = self.inner.allocator.allocate_segment(session_id, size)?;
        segment.init_header(session_id)?;
        self.inner
            .sessions
            .write()
            .insert(session_id.to_string(), SessionRecord { last_level: BackpressureLevel::None });
        Ok(segment)
    }

    pub fn release_segment(&self, session_id: &str) {
        self.inner.allocator.release_segment(session_id);
        self.inner.sessions.write().remove(session_id);
    }

    /// Builds the descriptor handed to the plugin over the pipe.
    pub fn try_get_segment_descriptor(&self, session_id: &str) -> Result<SegmentDescriptor, ShmemError> {
        let (offset, size) = self
            .inner
            .allocator
            .segment_info(session_id)
            .ok_or_else(|| ShmemError::Protocol(format!("no segment allocated for session '{session_id}'")))?;

        Ok(SegmentDescriptor {
            map_name: self.inner.map_name.clone(),
            map_capacity_bytes: self.inner.allocator.capacity_bytes(),
            unix_file_path: self.inner.unix_file_path.clone(),
            segment_offset: offset,
            segment_size: size,
        })
    }

    pub fn segment(&self, session_id: &str) -> Result<SessionSegment, ShmemError> {
        self.inner.allocator.segment(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SharedMemoryManagerConfig {
        SharedMemoryManagerConfig {
            map_name: "test-manager-map".to_string(),
            max_total_bytes: 64 * 1024,
            default_segment_bytes: 8 * 1024,
            min_segment_bytes: 4 * 1024,
            warning_threshold: 0.80,
            critical_threshold: 0.95,
            medium_threshold: 0.60,
            watchdog_interval: Duration::from_millis(50),
            unix_file_path: None,
            use_file_backed_on_unix: false,
        }
    }

    #[test]
    fn allocates_and_describes_a_segment() {
        let manager = SharedMemoryManager::new(config()).expect("manager");
        manager.allocate_segment_async("s1", 8192).expect("allocate");
        let descriptor = manager.try_get_segment_descriptor("s1").expect("descriptor");
        assert_eq!(descriptor.segment_size, 8192);
    }

    #[test]
    fn downgrades_when_remaining_capacity_is_tight() {
        let manager = SharedMemoryManager::new(config()).expect("manager");
        manager.allocate_segment_async("s1", 56 * 1024).expect("first");
        let segment = manager.allocate_segment_async("s2", 16 * 1024).expect("second downgraded");
        assert!(segment.free_bytes() > 0 || segment.free_bytes() == 0);
        let (_, size) = manager.inner.allocator.segment_info("s2").unwrap();
        assert!(size < 16 * 1024);
        assert!(size >= config().min_segment_bytes);
    }

    #[test]
    fn fails_when_even_minimum_does_not_fit() {
        let manager = SharedMemoryManager::new(config()).expect("manager");
        manager.allocate_segment_async("s1", 60 * 1024).expect("first");
        assert!(manager.allocate_segment_async("s2", 16 * 1024).is_err());
    }

    #[test]
    fn release_forgets_session() {
        let manager = SharedMemoryManager::new(config()).expect("manager");
        manager.allocate_segment_async("s1", 8192).expect("allocate");
        manager.release_segment("s1");
        assert!(manager.try_get_segment_descriptor("s1").is_err());
    }

    #[tokio::test]
    async fn watchdog_fires_backpressure_event_on_transition() {
        let manager = SharedMemoryManager::new(config()).expect("manager");
        let segment = manager.allocate_segment_async("s1", 8192).expect("allocate");
        let mut events = manager.subscribe();
        let _watchdog = manager.initialize();

        let payload = vec![0u8; 6000];
        segment.try_write_frame(&payload);

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event within timeout")
            .expect("event received");
        assert_eq!(event.session_id, "s1");
        assert_ne!(event.level, BackpressureLevel::None);
    }
}
