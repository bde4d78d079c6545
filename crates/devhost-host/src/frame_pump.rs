//! `FramePump`: the single long-running consumer that drains every
//! active session's shared-memory segment, publishes `DataReceivedEvent`,
//! and appends the formatted frame preview to the message stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devhost_abi::BackpressureLevel;
use devhost_shmem::SharedMemoryManager;
use devhost_streams::{format_frame_preview, Direction, MessageStreamService};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::event_bus::{DataReceivedEvent, EventBus, HostEvent};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A single decoded frame drained off a session's segment.
#[derive(Debug, Clone)]
pub struct PhysicalFrame {
    pub session_id: String,
    pub frame_id: i64,
    pub timestamp_utc: chrono::DateTime<chrono::Utc>,
    pub direction: Direction,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainState {
    Draining,
    Backoff,
    Stopped,
}

struct DrainLoop {
    session_id: String,
    state: Mutex<DrainState>,
    backpressure: AtomicBool,
    next_frame_id: AtomicI64,
}

/// Drains every registered session's segment on one task, coupling each
/// session's poll cadence to the shared-memory manager's backpressure
/// classification.
pub struct FramePump {
    shared_memory: SharedMemoryManager,
    streams: Arc<MessageStreamService>,
    events: Arc<EventBus<HostEvent>>,
    loops: Mutex<HashMap<String, Arc<DrainLoop>>>,
    shutdown: Arc<Notify>,
}

impl FramePump {
    #[must_use]
    pub fn new(shared_memory: SharedMemoryManager, streams: Arc<MessageStreamService>, events: Arc<EventBus<HostEvent>>) -> Self {
        Self {
            shared_memory,
            streams,
            events,
            loops: Mutex::new(HashMap::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Starts a drain loop task for `session_id`. Idempotent: re-starting
    /// an already-draining session is a no-op.
    pub fn start_session(self: &Arc<Self>, session_id: &str) {
        if self.loops.lock().contains_key(session_id) {
            return;
        }
        let drain_loop = Arc::new(DrainLoop {
            session_id: session_id.to_string(),
            state: Mutex::new(DrainState::Draining),
            backpressure: AtomicBool::new(false),
            next_frame_id: AtomicI64::new(1),
        });
        self.loops.lock().insert(session_id.to_string(), drain_loop.clone());

        let pump = self.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = pump.drain_until_stopped(drain_loop) => {}
                () = shutdown.notified() => {}
            }
        });
    }

    /// Marks a session's drain loop stopped. `Stopped` is terminal; the
    /// session must `connect` again to resume draining.
    pub fn stop_session(&self, session_id: &str) {
        if let Some(drain_loop) = self.loops.lock().remove(session_id) {
            *drain_loop.state.lock() = DrainState::Stopped;
        }
    }

    /// Subscribes a drain loop's backoff flag to `BackpressureDetected`
    /// transitions for its session.
    pub fn apply_backpressure(&self, session_id: &str, level: BackpressureLevel) {
        if let Some(drain_loop) = self.loops.lock().get(session_id) {
            drain_loop.backpressure.store(level == BackpressureLevel::High, Ordering::Relaxed);
        }
    }

    async fn drain_until_stopped(self: Arc<Self>, drain_loop: Arc<DrainLoop>) {
        loop {
            if *drain_loop.state.lock() == DrainState::Stopped {
                return;
            }

            let segment = match self.shared_memory.segment(&drain_loop.session_id) {
                Ok(segment) => segment,
                Err(_) => return,
            };

            match segment.try_read_frame() {
                Ok(Some((timestamp_ticks_utc, raw))) => {
                    *drain_loop.state.lock() = DrainState::Draining;
                    let frame_id = drain_loop.next_frame_id.fetch_add(1, Ordering::Relaxed);
                    self.handle_frame(&drain_loop.session_id, frame_id, timestamp_ticks_utc, raw);
                    continue;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(session_id = %drain_loop.session_id, error = %err, "drain loop stopping after malformed frame");
                    *drain_loop.state.lock() = DrainState::Stopped;
                    return;
                }
            }

            let backoff = drain_loop.backpressure.load(Ordering::Relaxed);
            *drain_loop.state.lock() = if backoff { DrainState::Backoff } else { DrainState::Draining };
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    fn handle_frame(&self, session_id: &str, frame_id: i64, timestamp_ticks_utc: i64, raw: Vec<u8>) {
        let timestamp_utc =
            chrono::DateTime::<chrono::Utc>::from_timestamp_micros(timestamp_ticks_utc).unwrap_or_else(chrono::Utc::now);
        let frame = PhysicalFrame {
            session_id: session_id.to_string(),
            frame_id,
            timestamp_utc,
            direction: Direction::Receive,
            raw,
        };

        self.events.publish(HostEvent::DataReceived(DataReceivedEvent {
            session_id: frame.session_id.clone(),
            frame_id: frame.frame_id,
            byte_len: frame.raw.len(),
        }));

        let preview = format_frame_preview(frame.direction, &frame.raw);
        self.streams.append(&frame.session_id, frame.direction, preview);
    }

    /// Cancels every drain loop; returns once they have had up to 2 s to
    /// observe the cancellation.
    pub async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        for drain_loop in self.loops.lock().values() {
            *drain_loop.state.lock() = DrainState::Stopped;
        }
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devhost_shmem::SharedMemoryManagerConfig;

    fn shared_memory() -> SharedMemoryManager {
        SharedMemoryManager::new(SharedMemoryManagerConfig {
            map_name: "frame-pump-test-map".to_string(),
            max_total_bytes: 128 * 1024,
            default_segment_bytes: 16 * 1024,
            min_segment_bytes: 4 * 1024,
            use_file_backed_on_unix: false,
            ..SharedMemoryManagerConfig::default()
        })
        .expect("manager")
    }

    #[tokio::test]
    async fn starting_and_stopping_a_session_is_idempotent() {
        let shared_memory = shared_memory();
        shared_memory.allocate_segment_async("s1", 8192).expect("allocate");
        let streams = Arc::new(MessageStreamService::default());
        let events = Arc::new(EventBus::new());
        let pump = Arc::new(FramePump::new(shared_memory, streams, events));

        pump.start_session("s1");
        pump.start_session("s1");
        assert_eq!(pump.loops.lock().len(), 1);

        pump.stop_session("s1");
        pump.stop_session("s1");
        pump.shutdown().await;
    }

    #[test]
    fn applying_backpressure_to_unknown_session_is_a_no_op() {
        let shared_memory = shared_memory();
        let streams = Arc::new(MessageStreamService::default());
        let events = Arc::new(EventBus::new());
        let pump = FramePump::new(shared_memory, streams, events);
        pump.apply_backpressure("ghost", BackpressureLevel::High);
    }
}
