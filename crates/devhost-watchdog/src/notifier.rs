//! `DropNotifier`: turns a stream of per-session drop events into a
//! rate-limited stream of user-visible notifications. The first drop for
//! a session is reported immediately; everything after that is batched
//! and surfaced no more often than `min_notify_interval`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::DropNotifierConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropNotification {
    pub session_id: String,
    pub dropped_count: u64,
    pub is_first: bool,
}

struct SessionState {
    last_notified_at: Option<Instant>,
    pending_since_last: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            last_notified_at: None,
            pending_since_last: 0,
        }
    }
}

pub struct DropNotifier {
    config: DropNotifierConfig,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl DropNotifier {
    #[must_use]
    pub fn new(config: DropNotifierConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Records one dropped frame/byte-range for `session_id`. Returns a
    /// notification when this drop is eligible to surface: the session's
    /// very first drop, or the first drop after `min_notify_interval` has
    /// elapsed since the last notification.
    pub fn record_drop(&self, session_id: &str) -> Option<DropNotification> {
        self.record_drop_at(session_id, Instant::now())
    }

    fn record_drop_at(&self, session_id: &str, now: Instant) -> Option<DropNotification> {
        let mut sessions = self.sessions.lock();
        let state = sessions.entry(session_id.to_string()).or_default();
        state.pending_since_last += 1;

        let should_notify = match state.last_notified_at {
            None => true,
            Some(last) => now.duration_since(last) >= self.config.min_notify_interval,
        };

        if !should_notify {
            return None;
        }

        let is_first = state.last_notified_at.is_none();
        let dropped_count = state.pending_since_last;
        state.pending_since_last = 0;
        state.last_notified_at = Some(now);

        Some(DropNotification {
            session_id: session_id.to_string(),
            dropped_count,
            is_first,
        })
    }

    /// Forgets a session's rate-limiting state, e.g. on disconnect.
    pub fn forget_session(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }
}

impl Default for DropNotifier {
    fn default() -> Self {
        Self::new(DropNotifierConfig::default())
    }
}
