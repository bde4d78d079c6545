//! `MessageStreamService`: the per-session bounded, paginated, searchable
//! log the frame pump appends to and the UI reads from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use devhost_watchdog::DropNotifier;
use regex::Regex;

use crate::buffer::BoundedBuffer;
use crate::message::{Direction, LogMessage};
use crate::{StreamError, StreamResult};

type Subscriber = Box<dyn Fn(&LogMessage) + Send + Sync>;

/// Default cap on messages retained per session before the oldest are
/// evicted.
pub const DEFAULT_MAX_MESSAGES: usize = 10_000;

struct SessionLog {
    buffer: BoundedBuffer<LogMessage>,
    next_sequence: AtomicU64,
    paused: AtomicBool,
    dropped_while_paused: AtomicU64,
}

impl SessionLog {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: BoundedBuffer::new(capacity),
            next_sequence: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            dropped_while_paused: AtomicU64::new(0),
        }
    }
}

/// Per-session bounded log buffer with pagination, substring/regex search,
/// synchronous subscription delivery, and a pause gate the frame pump
/// consults before appending a drained frame.
pub struct MessageStreamService {
    max_messages: usize,
    sessions: Mutex<HashMap<String, Arc<SessionLog>>>,
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    drop_notifier: DropNotifier,
}

impl MessageStreamService {
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            sessions: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            drop_notifier: DropNotifier::default(),
        }
    }

    fn session(&self, session_id: &str) -> Arc<SessionLog> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionLog::new(self.max_messages)))
            .clone()
    }

    /// Appends a new message unless the session is paused, in which case
    /// the append is dropped and counted. Returns the stored message, or
    /// `None` when the drop happened.
    pub fn append(&self, session_id: &str, direction: Direction, text: impl Into<String>) -> Option<LogMessage> {
        let log = self.session(session_id);
        if log.paused.load(Ordering::Acquire) {
            log.dropped_while_paused.fetch_add(1, Ordering::Relaxed);
            if let Some(notification) = self.drop_notifier.record_drop(session_id) {
                tracing::warn!(
                    session_id,
                    dropped_count = notification.dropped_count,
                    first = notification.is_first,
                    "messages dropped while stream paused"
                );
            }
            return None;
        }

        let sequence = log.next_sequence.fetch_add(1, Ordering::Relaxed);
        let message = LogMessage {
            session_id: session_id.to_string(),
            sequence,
            timestamp_utc: Utc::now(),
            direction,
            text: text.into(),
        };
        log.buffer.push(message.clone());
        self.notify(session_id, &message);
        Some(message)
    }

    fn notify(&self, session_id: &str, message: &LogMessage) {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handlers) = subscribers.get(session_id) {
            for handler in handlers {
                handler(message);
            }
        }
    }

    /// Returns up to `take` messages starting at `skip`, oldest first.
    #[must_use]
    pub fn get(&self, session_id: &str, skip: usize, take: usize) -> Vec<LogMessage> {
        self.session(session_id).buffer.page(skip, take)
    }

    /// Finds messages whose text matches `query`, either as a plain
    /// substring or, when `regex` is set, as a compiled pattern.
    pub fn search(&self, session_id: &str, query: &str, regex: bool) -> StreamResult<Vec<LogMessage>> {
        let snapshot = self.session(session_id).buffer.snapshot();
        if regex {
            let pattern = Regex::new(query).map_err(|e| StreamError::InvalidQuery(e.to_string()))?;
            Ok(snapshot.into_iter().filter(|m| pattern.is_match(&m.text)).collect())
        } else {
            Ok(snapshot.into_iter().filter(|m| m.text.contains(query)).collect())
        }
    }

    pub fn clear(&self, session_id: &str) {
        self.session(session_id).buffer.clear();
    }

    /// Registers a handler invoked synchronously, on the publisher's
    /// thread, for every message subsequently appended to this session.
    pub fn subscribe(&self, session_id: &str, handler: impl Fn(&LogMessage) + Send + Sync + 'static) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.entry(session_id.to_string()).or_default().push(Box::new(handler));
    }

    #[must_use]
    pub fn is_consumption_paused(&self, session_id: &str) -> bool {
        self.session(session_id).paused.load(Ordering::Acquire)
    }

    pub fn set_consumption_paused(&self, session_id: &str, paused: bool) {
        self.session(session_id).paused.store(paused, Ordering::Release);
    }

    /// Number of messages dropped for this session while it was paused.
    #[must_use]
    pub fn dropped_while_paused(&self, session_id: &str) -> u64 {
        self.session(session_id).dropped_while_paused.load(Ordering::Relaxed)
    }

    /// Forgets a session's log and subscribers entirely, e.g. on
    /// disconnect. A later `append` for the same id starts a fresh log.
    pub fn forget_session(&self, session_id: &str) {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).remove(session_id);
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).remove(session_id);
        self.drop_notifier.forget_session(session_id);
        tracing::debug!(session_id, "message stream forgotten");
    }
}

impl Default for MessageStreamService {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn append_and_page_round_trip() {
        let service = MessageStreamService::new(10);
        service.append("s1", Direction::Receive, "RX: 01");
        service.append("s1", Direction::Send, "TX: 02");
        let page = service.get("s1", 0, 10);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 0);
        assert_eq!(page[1].direction, Direction::Send);
    }

    #[test]
    fn buffer_evicts_oldest_past_the_cap() {
        let service = MessageStreamService::new(2);
        service.append("s1", Direction::Receive, "a");
        service.append("s1", Direction::Receive, "b");
        service.append("s1", Direction::Receive, "c");
        let page = service.get("s1", 0, 10);
        assert_eq!(page.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn pause_drops_and_counts_without_storing() {
        let service = MessageStreamService::new(10);
        service.set_consumption_paused("s1", true);
        assert!(service.append("s1", Direction::Receive, "dropped").is_none());
        assert_eq!(service.dropped_while_paused("s1"), 1);
        assert_eq!(service.get("s1", 0, 10).len(), 0);

        service.set_consumption_paused("s1", false);
        assert!(service.append("s1", Direction::Receive, "kept").is_some());
        assert_eq!(service.get("s1", 0, 10).len(), 1);
    }

    #[test]
    fn search_supports_substring_and_regex() {
        let service = MessageStreamService::new(10);
        service.append("s1", Direction::Receive, "RX: 01 02 (+4 bytes)");
        service.append("s1", Direction::Send, "TX: FF");

        let plain = service.search("s1", "FF", false).expect("search");
        assert_eq!(plain.len(), 1);

        let matched = service.search("s1", r"^RX: .*bytes\)$", true).expect("search");
        assert_eq!(matched.len(), 1);

        let bad_pattern = service.search("s1", "(", true);
        assert!(bad_pattern.is_err());
    }

    #[test]
    fn clear_empties_a_session_without_forgetting_it() {
        let service = MessageStreamService::new(10);
        service.append("s1", Direction::Receive, "x");
        service.clear("s1");
        assert_eq!(service.get("s1", 0, 10).len(), 0);
    }

    #[test]
    fn subscribers_are_invoked_synchronously_on_append() {
        let service = MessageStreamService::new(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        service.subscribe("s1", move |_msg| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
        });
        service.append("s1", Direction::Receive, "x");
        service.append("s1", Direction::Receive, "y");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn forgetting_a_session_resets_its_log() {
        let service = MessageStreamService::new(10);
        service.append("s1", Direction::Receive, "x");
        service.forget_session("s1");
        assert_eq!(service.get("s1", 0, 10).len(), 0);
        assert_eq!(service.dropped_while_paused("s1"), 0);
    }
}
