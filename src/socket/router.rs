//! Per-connection view of the shared event bus.
//!
//! The router registers listeners under its own [`ConnectionId`], wraps
//! them so each receives the payload it expects (decoded bytes, error
//! message, address, or nothing) and hands back [`Subscription`] handles
//! for removal.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use tracing::{trace, warn};

use crate::identifiers::{ConnectionId, ListenerId};
use crate::protocol::{Address, Event, EventKind, EventPayload, decode_wire};
use crate::transport::EventBus;

// ============================================================================
// Subscription
// ============================================================================

/// Handle of one listener registration, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// Event the listener is registered for.
    kind: EventKind,
    /// Bus registration.
    listener_id: ListenerId,
}

impl Subscription {
    /// Returns the event the listener is registered for.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// How often a listener runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// On every matching event.
    Every,
    /// On the first matching event, then removed.
    Once,
}

// ============================================================================
// EventRouter
// ============================================================================

/// Listener registry of one connection on the shared bus.
#[derive(Debug, Clone)]
pub(crate) struct EventRouter {
    /// Connection this router serves.
    id: ConnectionId,
    /// The shared bus.
    bus: Arc<EventBus>,
}

impl EventRouter {
    pub(crate) fn new(id: ConnectionId, bus: Arc<EventBus>) -> Self {
        Self { id, bus }
    }

    #[inline]
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Registers a zero-argument notification for `kind`.
    pub(crate) fn on<F>(&self, kind: EventKind, delivery: Delivery, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(kind, delivery, move |_| callback())
    }

    /// Registers a `data` listener receiving decoded bytes.
    pub(crate) fn on_data<F>(&self, delivery: Delivery, callback: F) -> Subscription
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Data, delivery, move |event| {
            let EventPayload::Data { data } = &event.payload else {
                return;
            };
            match decode_wire(data) {
                Ok(bytes) => callback(bytes),
                Err(e) => warn!(id = %event.id, error = %e, "Dropping undecodable data event"),
            }
        })
    }

    /// Registers an `error` listener receiving the transport message.
    pub(crate) fn on_error<F>(&self, delivery: Delivery, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Error, delivery, move |event| {
            if let EventPayload::Error { error } = &event.payload {
                callback(error);
            }
        })
    }

    /// Registers a `connect` listener receiving the remote address.
    pub(crate) fn on_connect<F>(&self, delivery: Delivery, callback: F) -> Subscription
    where
        F: Fn(&Address) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Connect, delivery, move |event| {
            if let EventPayload::Connect { address } = &event.payload {
                callback(address);
            }
        })
    }

    /// Registers a `close` listener receiving the `had_error` flag.
    pub(crate) fn on_close<F>(&self, delivery: Delivery, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Close, delivery, move |event| {
            if let EventPayload::Close { had_error } = event.payload {
                callback(had_error);
            }
        })
    }

    /// Removes a registration. Returns `false` if it was already gone.
    pub(crate) fn off(&self, subscription: Subscription) -> bool {
        self.bus
            .remove_listener(self.id, subscription.kind, subscription.listener_id)
    }

    /// Returns `true` if the registration has not been removed or consumed.
    pub(crate) fn is_registered(&self, subscription: Subscription) -> bool {
        self.bus
            .contains_listener(self.id, subscription.kind, subscription.listener_id)
    }

    /// Removes every registration of this connection, internal and user.
    pub(crate) fn clear(&self) -> usize {
        self.bus.remove_all_listeners(self.id)
    }

    /// Emits an event for this connection.
    pub(crate) fn emit(&self, payload: EventPayload) -> usize {
        self.bus.emit(&Event::new(self.id, payload))
    }

    /// Wraps `handler` with the identifier check and registers it.
    fn subscribe<F>(&self, kind: EventKind, delivery: Delivery, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.id;
        let filtered = move |event: &Event| {
            if event.id != id {
                trace!(%id, other = %event.id, "Ignoring event for another connection");
                return;
            }
            handler(event);
        };

        let listener_id = match delivery {
            Delivery::Every => self.bus.add_listener(id, kind, filtered),
            Delivery::Once => self.bus.once(id, kind, filtered),
        };

        Subscription { kind, listener_id }
    }
}

// ============================================================================
// Tests
// ============================================================================
