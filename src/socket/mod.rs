//! Client socket module.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SocketHandle`] | One client connection (state, writes, listeners) |
//! | [`ConnectOptions`] | Parameters of a connect attempt |
//! | [`ConnectionState`] | Disconnected / Connecting / Connected |
//! | [`Subscription`] | Handle for removing a listener |
//!
//! # Example
//!
//! ```ignore
//! use evented_tcp::{ConnectOptions, EventBus, SocketHandle};
//!
//! let socket = SocketHandle::new(EventBus::new(), transport);
//! socket.on_close(|had_error| println!("closed, error: {had_error}"));
//! socket.connect_with(ConnectOptions::new("example.com", 80), |address| {
//!     println!("connected to {}:{}", address.ip, address.port);
//! })?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Socket handle.
pub mod handle;

/// Connection options.
pub mod options;

mod router;

/// Connection state machine.
pub mod state;

mod timeout;

// ============================================================================
// Re-exports
// ============================================================================

pub use handle::{SocketHandle, WriteCallback};
pub use options::{ConnectOptions, DEFAULT_HOST, DEFAULT_LOCAL_ADDRESS};
pub use router::Subscription;
pub use state::{ConnectCallback, ConnectionState};
pub use timeout::TimeoutCallback;
