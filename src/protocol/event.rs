//! Event message types.
//!
//! Events are notifications the transport publishes on the shared bus.
//! Every event carries the [`ConnectionId`] of the socket it belongs to.
//!
//! # Format
//!
//! ```json
//! { "id": 7, "event": "connect", "address": { "ip": "1.2.3.4", "port": 80, "family": "IPv4" } }
//! { "id": 7, "event": "data", "data": "aGk=" }
//! { "id": 7, "event": "error", "error": "connection reset" }
//! { "id": 7, "event": "close", "hadError": false }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::payload::encode_wire;

// ============================================================================
// EventKind
// ============================================================================

/// Event name used as the listener registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connection established.
    Connect,
    /// Bytes received.
    Data,
    /// Connection-level failure.
    Error,
    /// Connection fully closed.
    Close,
    /// Remote end half-closed.
    End,
    /// Transport write buffer drained.
    Drain,
    /// Idle timeout elapsed.
    Timeout,
}

impl EventKind {
    /// Returns the event name.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Data => "data",
            Self::Error => "error",
            Self::Close => "close",
            Self::End => "end",
            Self::Drain => "drain",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "connect" => Ok(Self::Connect),
            "data" => Ok(Self::Data),
            "error" => Ok(Self::Error),
            "close" => Ok(Self::Close),
            "end" => Ok(Self::End),
            "drain" => Ok(Self::Drain),
            "timeout" => Ok(Self::Timeout),
            _ => Err(Error::unknown_event(name)),
        }
    }
}

// ============================================================================
// Address
// ============================================================================

/// Remote address reported by the transport on connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Remote IP address.
    #[serde(alias = "address")]
    pub ip: String,

    /// Remote port.
    #[serde(default)]
    pub port: u16,

    /// Address family (`IPv4` / `IPv6`).
    #[serde(default)]
    pub family: String,
}

impl Address {
    /// Creates an address with only the IP known.
    #[inline]
    #[must_use]
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the address family.
    #[inline]
    #[must_use]
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }
}

// ============================================================================
// EventPayload
// ============================================================================

/// Event-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EventPayload {
    /// Connection established.
    Connect {
        /// Remote address.
        address: Address,
    },
    /// Bytes received, base64 wire text.
    Data {
        /// Wire-encoded bytes.
        data: String,
    },
    /// Connection-level failure.
    Error {
        /// Transport error message.
        error: String,
    },
    /// Connection closed.
    Close {
        /// Whether the close was caused by an error.
        #[serde(rename = "hadError", default)]
        had_error: bool,
    },
    /// Remote end half-closed.
    End,
    /// Write buffer drained.
    Drain,
    /// Idle timeout elapsed.
    Timeout,
}

// ============================================================================
// Event
// ============================================================================

/// A notification on the shared bus, tagged with its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Connection the event belongs to.
    pub id: ConnectionId,

    /// Event-specific data.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(id: ConnectionId, payload: EventPayload) -> Self {
        Self { id, payload }
    }

    /// Creates a `connect` event.
    #[inline]
    #[must_use]
    pub fn connect(id: ConnectionId, address: Address) -> Self {
        Self::new(id, EventPayload::Connect { address })
    }

    /// Creates a `data` event, wire-encoding `bytes`.
    #[inline]
    #[must_use]
    pub fn data(id: ConnectionId, bytes: &[u8]) -> Self {
        Self::new(
            id,
            EventPayload::Data {
                data: encode_wire(bytes),
            },
        )
    }

    /// Creates an `error` event.
    #[inline]
    #[must_use]
    pub fn error(id: ConnectionId, error: impl Into<String>) -> Self {
        Self::new(
            id,
            EventPayload::Error {
                error: error.into(),
            },
        )
    }

    /// Creates a `close` event.
    #[inline]
    #[must_use]
    pub fn close(id: ConnectionId, had_error: bool) -> Self {
        Self::new(id, EventPayload::Close { had_error })
    }

    /// Creates a `timeout` event.
    #[inline]
    #[must_use]
    pub fn timeout(id: ConnectionId) -> Self {
        Self::new(id, EventPayload::Timeout)
    }

    /// Returns the event name.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Connect { .. } => EventKind::Connect,
            EventPayload::Data { .. } => EventKind::Data,
            EventPayload::Error { .. } => EventKind::Error,
            EventPayload::Close { .. } => EventKind::Close,
            EventPayload::End => EventKind::End,
            EventPayload::Drain => EventKind::Drain,
            EventPayload::Timeout => EventKind::Timeout,
        }
    }

    /// Parses an event from its JSON form.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if `text` is not a valid event.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the event to JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ConnectionId {
        ConnectionId::from_u32(7).expect("non-zero")
    }

    #[test]
    fn test_event_kind_names() {
        for kind in [
            EventKind::Connect,
            EventKind::Data,
            EventKind::Error,
            EventKind::Close,
            EventKind::End,
            EventKind::Drain,
            EventKind::Timeout,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!(matches!(
            "finish".parse::<EventKind>(),
            Err(Error::UnknownEvent { .. })
        ));
    }

    #[test]
    fn test_parse_connect_event() {
        let event =
            Event::from_json(r#"{"id":7,"event":"connect","address":{"ip":"1.2.3.4"}}"#).unwrap();
        assert_eq!(event.id, id());
        assert_eq!(event.kind(), EventKind::Connect);
        assert_eq!(event, Event::connect(id(), Address::new("1.2.3.4")));
    }

    #[test]
    fn test_parse_address_alias() {
        let event = Event::from_json(
            r#"{"id":7,"event":"connect","address":{"address":"::1","port":443,"family":"IPv6"}}"#,
        )
        .unwrap();
        let expected = Address::new("::1").with_port(443).with_family("IPv6");
        assert_eq!(event, Event::connect(id(), expected));
    }

    #[test]
    fn test_parse_close_event() {
        let event = Event::from_json(r#"{"id":7,"event":"close","hadError":true}"#).unwrap();
        assert_eq!(event, Event::close(id(), true));

        let event = Event::from_json(r#"{"id":7,"event":"close"}"#).unwrap();
        assert_eq!(event, Event::close(id(), false));
    }

    #[test]
    fn test_data_event_json() {
        let json = Event::data(id(), b"hi").to_json().unwrap();
        assert_eq!(json, r#"{"id":7,"event":"data","data":"aGk="}"#);
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result = Event::from_json(r#"{"id":7,"event":"finish"}"#);
        assert!(matches!(result, Err(Error::Json(_))));
    }
}
