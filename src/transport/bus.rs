//! Shared publish/subscribe bus for transport events.
//!
//! Manages listener registrations keyed by [`ConnectionId`] and
//! [`EventKind`]. Every socket on the same transport shares one bus;
//! routing by identifier means an event is only ever delivered to the
//! listeners of the connection it names.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               EventBus                  │
//! │  ┌─────────────────────────────────┐    │
//! │  │ id=1 → connect → [f, g]         │    │
//! │  │        data    → [h]            │    │
//! │  │ id=2 → close   → [k]            │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::{ConnectionId, ListenerId};
use crate::protocol::{Event, EventKind};

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Called with each event delivered to the registration.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// One listener registration.
struct Registration {
    /// Handle used for removal.
    listener_id: ListenerId,
    /// Removed before its first invocation.
    once: bool,
    /// The callback.
    listener: Listener,
}

/// Registrations of one connection, by event kind.
type KindMap = FxHashMap<EventKind, Vec<Registration>>;

/// Routing table of the bus.
type Routes = FxHashMap<ConnectionId, KindMap>;

// ============================================================================
// EventBus
// ============================================================================

/// Shared event bus routed by connection identifier.
///
/// Thread-safe, shared by every socket on a transport. Listeners for the
/// same event run in registration order. No lock is held while a
/// listener runs, so listeners may register or remove listeners.
///
/// # Example
///
/// ```ignore
/// let bus = EventBus::new();
/// let id = ConnectionId::next();
///
/// bus.add_listener(id, EventKind::Close, |event| println!("{event:?}"));
/// bus.emit(&Event::close(id, false));
/// ```
#[derive(Default)]
pub struct EventBus {
    /// Listener registrations.
    routes: RwLock<Routes>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// EventBus - Constructor
// ============================================================================

impl EventBus {
    /// Creates an empty shared bus.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

// ============================================================================
// EventBus - Registration
// ============================================================================

impl EventBus {
    /// Registers a listener for `kind` events of connection `id`.
    pub fn add_listener<F>(&self, id: ConnectionId, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(id, kind, false, Arc::new(listener))
    }

    /// Registers a listener removed after its first invocation.
    pub fn once<F>(&self, id: ConnectionId, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(id, kind, true, Arc::new(listener))
    }

    /// Removes one registration.
    ///
    /// Returns `false` if it was not registered (already removed, or a
    /// consumed one-shot listener).
    pub fn remove_listener(
        &self,
        id: ConnectionId,
        kind: EventKind,
        listener_id: ListenerId,
    ) -> bool {
        let mut routes = self.routes.write();
        let Some(kinds) = routes.get_mut(&id) else {
            return false;
        };
        let Some(registrations) = kinds.get_mut(&kind) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|r| r.listener_id != listener_id);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            kinds.remove(&kind);
        }
        if kinds.is_empty() {
            routes.remove(&id);
        }

        removed
    }

    /// Removes every registration of connection `id`.
    ///
    /// Returns the number of registrations removed.
    pub fn remove_all_listeners(&self, id: ConnectionId) -> usize {
        let removed = self.routes.write().remove(&id);
        let count = removed.map_or(0, |kinds| kinds.values().map(Vec::len).sum());

        if count > 0 {
            debug!(%id, count, "Removed all listeners");
        }

        count
    }

    /// Stores a registration.
    fn register(
        &self,
        id: ConnectionId,
        kind: EventKind,
        once: bool,
        listener: Listener,
    ) -> ListenerId {
        let listener_id = ListenerId::next();

        self.routes
            .write()
            .entry(id)
            .or_default()
            .entry(kind)
            .or_default()
            .push(Registration {
                listener_id,
                once,
                listener,
            });

        trace!(%id, %kind, %listener_id, once, "Listener registered");
        listener_id
    }
}

// ============================================================================
// EventBus - Introspection
// ============================================================================

impl EventBus {
    /// Returns the number of listeners for `kind` on connection `id`.
    #[must_use]
    pub fn listener_count(&self, id: ConnectionId, kind: EventKind) -> usize {
        self.routes
            .read()
            .get(&id)
            .and_then(|kinds| kinds.get(&kind))
            .map_or(0, Vec::len)
    }

    /// Returns `true` if the registration is still live.
    #[must_use]
    pub fn contains_listener(
        &self,
        id: ConnectionId,
        kind: EventKind,
        listener_id: ListenerId,
    ) -> bool {
        self.routes
            .read()
            .get(&id)
            .and_then(|kinds| kinds.get(&kind))
            .is_some_and(|registrations| {
                registrations.iter().any(|r| r.listener_id == listener_id)
            })
    }

    /// Returns the number of listeners of any kind on connection `id`.
    #[must_use]
    pub fn listeners(&self, id: ConnectionId) -> usize {
        self.routes
            .read()
            .get(&id)
            .map_or(0, |kinds| kinds.values().map(Vec::len).sum())
    }

    /// Returns the number of connections with at least one listener.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.routes.read().len()
    }
}

// ============================================================================
// EventBus - Dispatch
// ============================================================================

impl EventBus {
    /// Delivers `event` to the listeners of its connection and kind.
    ///
    /// One-shot listeners are consumed before any listener runs. Returns
    /// the number of listeners invoked; events nobody listens for are
    /// dropped.
    pub fn emit(&self, event: &Event) -> usize {
        let id = event.id;
        let kind = event.kind();

        let snapshot: Vec<Listener> = {
            let mut routes = self.routes.write();
            let Some(kinds) = routes.get_mut(&id) else {
                trace!(%id, %kind, "No listeners for connection, event dropped");
                return 0;
            };
            let Some(registrations) = kinds.get_mut(&kind) else {
                trace!(%id, %kind, "No listeners for event, event dropped");
                return 0;
            };

            let snapshot = registrations
                .iter()
                .map(|r| Arc::clone(&r.listener))
                .collect();
            registrations.retain(|r| !r.once);

            if registrations.is_empty() {
                kinds.remove(&kind);
            }
            if kinds.is_empty() {
                routes.remove(&id);
            }

            snapshot
        };

        trace!(%id, %kind, listeners = snapshot.len(), "Dispatching event");

        for listener in &snapshot {
            listener(event);
        }

        snapshot.len()
    }

    /// Parses a JSON event and delivers it.
    ///
    /// # Errors
    ///
    /// [`Error::Json`](crate::Error::Json) if `text` is not a valid event.
    pub fn emit_json(&self, text: &str) -> Result<usize> {
        let event = Event::from_json(text)?;
        Ok(self.emit(&event))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Event) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        (count, move |_: &Event| {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_routes_by_connection() {
        let bus = EventBus::new();
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        let (count_a, listener_a) = counter();
        let (count_b, listener_b) = counter();

        bus.add_listener(a, EventKind::Close, listener_a);
        bus.add_listener(b, EventKind::Close, listener_b);

        assert_eq!(bus.emit(&Event::close(a, false)), 1);
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_emit_in_registration_order() {
        let bus = EventBus::new();
        let id = ConnectionId::next();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.add_listener(id, EventKind::Drain, move |_| order.lock().push(n));
        }

        bus.emit(&Event::new(id, crate::protocol::EventPayload::Drain));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_once_consumed() {
        let bus = EventBus::new();
        let id = ConnectionId::next();
        let (count, listener) = counter();

        let listener_id = bus.once(id, EventKind::Timeout, listener);
        assert_eq!(bus.listener_count(id, EventKind::Timeout), 1);
        assert!(bus.contains_listener(id, EventKind::Timeout, listener_id));

        bus.emit(&Event::timeout(id));
        bus.emit(&Event::timeout(id));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(id, EventKind::Timeout), 0);
        assert!(!bus.contains_listener(id, EventKind::Timeout, listener_id));
        assert!(!bus.remove_listener(id, EventKind::Timeout, listener_id));
    }

    #[test]
    fn test_remove_listener() {
        let bus = EventBus::new();
        let id = ConnectionId::next();
        let (count, listener) = counter();

        let listener_id = bus.add_listener(id, EventKind::End, listener);
        assert!(bus.remove_listener(id, EventKind::End, listener_id));
        assert_eq!(bus.connection_count(), 0);

        bus.emit(&Event::new(id, crate::protocol::EventPayload::End));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_all_listeners() {
        let bus = EventBus::new();
        let id = ConnectionId::next();
        let other = ConnectionId::next();

        bus.add_listener(id, EventKind::Data, |_| {});
        bus.add_listener(id, EventKind::Close, |_| {});
        bus.add_listener(other, EventKind::Close, |_| {});

        assert_eq!(bus.listeners(id), 2);
        assert_eq!(bus.remove_all_listeners(id), 2);
        assert_eq!(bus.listeners(id), 0);
        assert_eq!(bus.listeners(other), 1);
    }

    #[test]
    fn test_listener_may_clear_during_dispatch() {
        let bus = EventBus::new();
        let id = ConnectionId::next();
        let (count, listener) = counter();

        let bus_clone = Arc::clone(&bus);
        bus.add_listener(id, EventKind::Close, move |event| {
            bus_clone.remove_all_listeners(event.id);
        });
        bus.add_listener(id, EventKind::Close, listener);

        // The snapshot taken before dispatch still reaches the second listener.
        assert_eq!(bus.emit(&Event::close(id, false)), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listeners(id), 0);
    }

    #[test]
    fn test_emit_json() {
        let bus = EventBus::new();
        let id = ConnectionId::from_u32(9000).expect("non-zero");
        let (count, listener) = counter();
        bus.add_listener(id, EventKind::Close, listener);

        let delivered = bus
            .emit_json(r#"{"id":9000,"event":"close","hadError":false}"#)
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(bus.emit_json("not json").is_err());
    }
}
