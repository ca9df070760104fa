//! Transport capability and the shared event bus.
//!
//! The transport performs the actual socket I/O. Calls into it are
//! fire-and-forget; results come back asynchronously as [`Event`](crate::protocol::Event)s
//! published on the [`EventBus`], keyed by [`ConnectionId`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   connect / write / end / destroy   ┌─────────────────┐
//! │  SocketHandle   │────────────────────────────────────►│   Transport     │
//! │  (per id)       │                                     │  (socket I/O)   │
//! │                 │◄──────────┐                         │                 │
//! └─────────────────┘           │                         └────────┬────────┘
//!                        ┌──────┴──────────────┐                   │
//!                        │      EventBus       │◄──────────────────┘
//!                        │ id → kind → [fn]    │   emit(Event { id, .. })
//!                        └─────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bus` | Shared publish/subscribe bus routed by connection id |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::socket::ConnectOptions;

// ============================================================================
// Submodules
// ============================================================================

/// Shared event bus.
pub mod bus;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{EventBus, Listener};

// ============================================================================
// Types
// ============================================================================

/// Completion callback for [`Transport::write`].
///
/// Invoked exactly once with the outcome of the write.
pub type WriteCompletion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

// ============================================================================
// Transport
// ============================================================================

/// Byte-level socket implementation driven by [`SocketHandle`](crate::SocketHandle).
///
/// Implementations must not block. Connection outcomes, inbound data,
/// errors and closes are published as events on the bus rather than
/// returned from these calls, and may be published synchronously from
/// inside a call.
pub trait Transport: Send + Sync {
    /// Opens a connection to `host:port` for `id`.
    fn connect(&self, id: ConnectionId, host: &str, port: u16, options: &ConnectOptions);

    /// Writes base64 wire text on `id`, reporting the outcome through
    /// `on_complete`.
    fn write(&self, id: ConnectionId, data: String, on_complete: WriteCompletion);

    /// Half-closes `id` after pending writes flush.
    fn end(&self, id: ConnectionId);

    /// Closes `id` immediately, discarding pending writes.
    fn destroy(&self, id: ConnectionId);

    /// Enables or disables Nagle's algorithm on `id`.
    fn set_no_delay(&self, id: ConnectionId, no_delay: bool) {
        debug!(%id, no_delay, "set_no_delay not supported by transport");
    }

    /// Enables or disables TCP keep-alive on `id`.
    fn set_keep_alive(&self, id: ConnectionId, enable: bool, initial_delay: Duration) {
        debug!(
            %id,
            enable,
            initial_delay_ms = initial_delay.as_millis() as u64,
            "set_keep_alive not supported by transport"
        );
    }
}
