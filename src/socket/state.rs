//! Connection state machine.
//!
//! ```text
//!              connect()                 connect event
//! Disconnected ─────────► Connecting ─────────────────► Connected
//!      ▲                      │                             │
//!      └──── close event / destroy() ───────────────────────┘
//! ```
//!
//! [`Lifecycle`] holds no locks and calls nothing; the socket applies
//! its decisions (listener cleanup, transport calls, callbacks) after
//! releasing the lock around it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::Address;

// ============================================================================
// Types
// ============================================================================

/// One-shot callback run when the pending connect completes.
pub type ConnectCallback = Box<dyn FnOnce(&Address) + Send + 'static>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Current state of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected (initial and terminal).
    #[default]
    Disconnected,
    /// Connect requested, waiting for the transport.
    Connecting,
    /// Connected and writable.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Mutable lifecycle data of one socket.
pub(crate) struct Lifecycle {
    /// Connection the state belongs to (for logging).
    id: ConnectionId,
    /// Current state.
    state: ConnectionState,
    /// Set by `end`, cleared by `connect`.
    ended: bool,
    /// Set by `destroy`, cleared by `connect`.
    destroyed: bool,
    /// A destroyed attempt's `close` has not arrived yet.
    close_pending: bool,
    /// `close` events still owed by earlier destroyed attempts.
    stale_closes: u32,
    /// Internal connect/close/error listeners are on the bus.
    events_registered: bool,
    /// Last remote address.
    address: Option<Address>,
    /// Callback of the current connect attempt.
    pending_connect: Option<ConnectCallback>,
    /// Bytes confirmed by successful write completions.
    bytes_written: u64,
}

impl Lifecycle {
    /// Creates a disconnected lifecycle.
    pub(crate) fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: ConnectionState::Disconnected,
            ended: false,
            destroyed: false,
            close_pending: false,
            stale_closes: 0,
            events_registered: false,
            address: None,
            pending_connect: None,
            bytes_written: 0,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` once ended or destroyed.
    #[inline]
    pub(crate) fn is_destroyed(&self) -> bool {
        self.ended || self.destroyed
    }

    #[inline]
    pub(crate) fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    #[inline]
    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Starts a connect attempt.
    ///
    /// Returns `true` if the internal lifecycle listeners still have to
    /// be registered for this attempt.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if already connecting or connected.
    pub(crate) fn begin_connect(&mut self, callback: Option<ConnectCallback>) -> Result<bool> {
        if self.state != ConnectionState::Disconnected {
            return Err(Error::invalid_state("connect", self.state));
        }

        if self.close_pending {
            self.close_pending = false;
            self.stale_closes += 1;
        }

        self.transition(ConnectionState::Connecting);
        self.ended = false;
        self.destroyed = false;
        self.pending_connect = callback;

        let register = !self.events_registered;
        self.events_registered = true;
        Ok(register)
    }

    /// Applies a `connect` event.
    ///
    /// Returns the pending connect callback, at most once per attempt.
    /// Ignored once destroyed; an ended socket still completes its
    /// connect.
    pub(crate) fn connected(&mut self, address: Address) -> Option<ConnectCallback> {
        if self.destroyed {
            trace!(id = %self.id, "Connect event after destroy ignored");
            return None;
        }

        self.transition(ConnectionState::Connected);
        self.address = Some(address);
        self.pending_connect.take()
    }

    /// Applies a `close` event.
    ///
    /// Returns `true` if the socket's listeners must be released. A close
    /// on a socket that is already disconnected, and not destroyed, is a
    /// no-op, as is the late close of an attempt destroyed before the
    /// current `connect`.
    pub(crate) fn closed(&mut self) -> bool {
        if self.stale_closes > 0 {
            self.stale_closes -= 1;
            trace!(id = %self.id, "Close of an earlier attempt ignored");
            return false;
        }
        if self.state == ConnectionState::Disconnected && !self.destroyed {
            trace!(id = %self.id, "Close while disconnected ignored");
            return false;
        }

        self.transition(ConnectionState::Disconnected);
        self.events_registered = false;
        self.close_pending = false;
        self.pending_connect = None;
        true
    }

    /// Marks the socket ended. Returns `false` if already ended or
    /// destroyed.
    pub(crate) fn end(&mut self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.ended = true;
        true
    }

    /// Marks the socket destroyed and disconnected. Returns `false` if
    /// already ended or destroyed.
    pub(crate) fn destroy(&mut self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.destroyed = true;
        self.close_pending = self.state != ConnectionState::Disconnected;
        self.pending_connect = None;
        self.transition(ConnectionState::Disconnected);
        true
    }

    /// Checks that a write may be issued.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if disconnected
    /// - [`Error::WriteAfterEnd`] if ended
    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Err(Error::invalid_state("write", self.state));
        }
        if self.is_destroyed() {
            return Err(Error::WriteAfterEnd);
        }
        Ok(())
    }

    /// Counts bytes confirmed by the transport.
    #[inline]
    pub(crate) fn record_written(&mut self, bytes: usize) {
        self.bytes_written += bytes as u64;
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(id = %self.id, from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
