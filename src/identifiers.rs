//! Type-safe identifiers for sockets and listeners.
//!
//! Newtype wrappers prevent mixing a connection identifier with a
//! listener registration at compile time.
//!
//! | Type | Backing | Source |
//! |------|---------|--------|
//! | [`ConnectionId`] | `NonZeroU32` | [`ConnectionId::next`] or the transport |
//! | [`ListenerId`] | `u64` | [`ListenerId::next`] (bus-internal) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// Counters
// ============================================================================

/// Next connection identifier handed out by [`ConnectionId::next`].
static NEXT_CONNECTION_ID: AtomicU32 = AtomicU32::new(1);

/// Next listener identifier handed out by [`ListenerId::next`].
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier naming one logical connection on the shared event bus.
///
/// Assigned once when a socket is created and never changed. Every
/// event the transport emits carries it as the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(NonZeroU32);

impl ConnectionId {
    /// Allocates a fresh process-unique identifier.
    #[must_use]
    pub fn next() -> Self {
        loop {
            let raw = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            // Skips zero after wrap-around.
            if let Some(id) = NonZeroU32::new(raw) {
                return Self(id);
            }
        }
    }

    /// Wraps an identifier assigned elsewhere (e.g. by the transport).
    ///
    /// Returns `None` for zero.
    #[inline]
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Identifier of one listener registration on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates a fresh listener identifier.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
