//! Evented TCP - client sockets driven by an asynchronous event stream.
//!
//! This library provides a stream-socket facade over a transport that
//! performs the actual I/O elsewhere and reports back through events.
//!
//! # Architecture
//!
//! The socket follows a request/event model:
//!
//! - **Socket (Rust)**: Validates calls, encodes payloads, tracks state
//! - **Transport**: Performs socket I/O, publishes events on a shared bus
//!
//! Key design principles:
//!
//! - Each [`SocketHandle`] owns one [`ConnectionId`]; events are routed by it
//! - Outbound bytes travel as base64 text, inbound `data` events likewise
//! - Lifecycle is event-driven: connect, close and errors arrive as events
//! - An idle timer reports inactivity but never closes the connection
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use evented_tcp::{ConnectOptions, EventBus, Result, SocketHandle, Transport};
//!
//! async fn example(transport: Arc<dyn Transport>) -> Result<()> {
//!     let bus = EventBus::new();
//!     let socket = SocketHandle::new(Arc::clone(&bus), transport);
//!
//!     socket.on_data(|bytes| println!("{} bytes", bytes.len()));
//!     socket.set_timeout(Duration::from_secs(30));
//!
//!     socket.connect_async(ConnectOptions::new("example.com", 80)).await?;
//!     socket.write_async("GET / HTTP/1.0\r\n\r\n").await?;
//!     socket.end();
//!
//!     Ok(())
//! }
//! ```
//!
//! The transport feeds events back with [`EventBus::emit`] or
//! [`EventBus::emit_json`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`socket`] | Client socket: [`SocketHandle`], [`ConnectOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Event and payload wire types |
//! | [`transport`] | Transport trait and [`EventBus`] |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for connections and listeners.
pub mod identifiers;

/// Event and payload wire types.
pub mod protocol;

/// Client socket.
///
/// Use [`SocketHandle::new`] to create a socket on a bus and transport.
pub mod socket;

/// Transport capability and event bus.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Socket types
pub use socket::{
    ConnectCallback, ConnectOptions, ConnectionState, SocketHandle, Subscription,
    TimeoutCallback, WriteCallback,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, ListenerId};

// Protocol types
pub use protocol::{Address, Encoding, Event, EventKind, EventPayload, Payload};

// Transport types
pub use transport::{EventBus, Listener, Transport, WriteCompletion};
