//! `EventBus`: process-internal, synchronous publish/subscribe. Every
//! subscriber runs on the publishing thread in registration order, so a
//! handler that blocks stalls every other handler and the publisher
//! itself — handlers must be cheap.

use parking_lot::RwLock;

use devhost_shmem::BackpressureDetected;

/// A session transitioned to `Connected` and began accepting frames.
#[derive(Debug, Clone)]
pub struct SessionCreatedEvent {
    pub session_id: String,
    pub plugin_id: String,
    pub capability_id: String,
}

/// A session was torn down, by request or because its host process died.
#[derive(Debug, Clone)]
pub struct SessionClosedEvent {
    pub session_id: String,
    pub reason: Option<String>,
}

/// The frame pump drained `byte_len` bytes from a session's segment.
#[derive(Debug, Clone)]
pub struct DataReceivedEvent {
    pub session_id: String,
    pub frame_id: i64,
    pub byte_len: usize,
}

/// The host wrote `byte_len` bytes toward a session (reserved for future
/// host-to-plugin payload writes; the MVP frame pump only drains).
#[derive(Debug, Clone)]
pub struct DataSentEvent {
    pub session_id: String,
    pub byte_len: usize,
}

/// The full set of events the host's bus carries, per the component
/// design's event catalog.
#[derive(Debug, Clone)]
pub enum HostEvent {
    SessionCreated(SessionCreatedEvent),
    SessionClosed(SessionClosedEvent),
    DataReceived(DataReceivedEvent),
    DataSent(DataSentEvent),
    Backpressure(BackpressureDetected),
}

/// Generic synchronous pub/sub primitive. The host wires one
/// `EventBus<HostEvent>` for its lifecycle/data events; it is not
/// specific to that type in case another event catalog is layered on top
/// later.
pub struct EventBus<E> {
    subscribers: RwLock<Vec<Box<dyn Fn(&E) + Send + Sync>>>,
}

impl<E> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { subscribers: RwLock::new(Vec::new()) }
    }

    /// Registers `handler`, invoked for every subsequent `publish` call.
    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) {
        self.subscribers.write().push(Box::new(handler));
    }

    /// Invokes every subscriber, in registration order, on the calling
    /// thread.
    pub fn publish(&self, event: E) {
        for handler in self.subscribers.read().iter() {
            handler(&event);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn publish_invokes_all_subscribers_in_order() {
        let bus: EventBus<u32> = EventBus::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        let order_a = order.clone();
        bus.subscribe(move |event| order_a.write().push(("a", *event)));
        let order_b = order.clone();
        bus.subscribe(move |event| order_b.write().push(("b", *event)));

        bus.publish(42);
        assert_eq!(*order.read(), vec![("a", 42), ("b", 42)]);
    }

    #[test]
    fn subscriber_count_reflects_registrations() {
        let bus: EventBus<HostEvent> = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.subscribe(|_| {});
        bus.subscribe(|_| {});
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn host_event_variants_carry_session_id() {
        let calls = Arc::new(AtomicUsize::new(0));
        let bus: EventBus<HostEvent> = EventBus::new();
        let calls_clone = calls.clone();
        bus.subscribe(move |event| {
            if let HostEvent::SessionCreated(e) = event {
                assert_eq!(e.session_id, "s1");
                calls_clone.fetch_add(1, Ordering::Relaxed);
            }
        });
        bus.publish(HostEvent::SessionCreated(SessionCreatedEvent {
            session_id: "s1".to_string(),
            plugin_id: "plugin.serial".to_string(),
            capability_id: "serial".to_string(),
        }));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
