//! Client socket handle.
//!
//! [`SocketHandle`] ties one [`ConnectionId`] to a [`Transport`] and the
//! shared [`EventBus`]: it validates operations against the connection
//! state, wire-encodes outbound payloads, keeps the idle timer running
//! on traffic and turns transport events into state transitions.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use evented_tcp::{ConnectOptions, EventBus, SocketHandle};
//!
//! let bus = EventBus::new();
//! let socket = SocketHandle::new(bus, transport);
//!
//! socket.on_data(|bytes| println!("received {} bytes", bytes.len()));
//! socket.set_timeout(Duration::from_secs(30));
//!
//! let address = socket.connect_async(ConnectOptions::new("example.com", 80)).await?;
//! socket.write("GET / HTTP/1.0\r\n\r\n")?;
//! socket.end();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{Address, EventKind, Payload, encode_wire};
use crate::transport::{EventBus, Transport};

use super::options::ConnectOptions;
use super::router::{Delivery, EventRouter, Subscription};
use super::state::{ConnectCallback, ConnectionState, Lifecycle};
use super::timeout::TimeoutController;

// ============================================================================
// Types
// ============================================================================

/// Callback receiving the outcome of one write.
pub type WriteCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Internal shared state for a socket.
struct SocketInner {
    /// Routing key on the bus.
    id: ConnectionId,
    /// Socket I/O.
    transport: Arc<dyn Transport>,
    /// Listener registry on the shared bus.
    router: EventRouter,
    /// Idle timer.
    timeout: TimeoutController,
    /// State machine.
    lifecycle: Mutex<Lifecycle>,
}

// ============================================================================
// SocketHandle
// ============================================================================

/// A handle to one client TCP connection.
///
/// Cloning yields another handle to the same connection. All methods are
/// non-blocking; outcomes arrive as events. The idle timer runs on the
/// tokio runtime the socket was created in; a socket created outside any
/// runtime binds to the first runtime it is armed from.
#[derive(Clone)]
pub struct SocketHandle {
    /// Shared inner state.
    inner: Arc<SocketInner>,
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SocketHandle - Constructor
// ============================================================================

impl SocketHandle {
    /// Creates a socket with a fresh identifier.
    #[must_use]
    pub fn new(bus: Arc<EventBus>, transport: Arc<dyn Transport>) -> Self {
        Self::with_id(ConnectionId::next(), bus, transport)
    }

    /// Creates a socket with an identifier assigned elsewhere.
    #[must_use]
    pub fn with_id(id: ConnectionId, bus: Arc<EventBus>, transport: Arc<dyn Transport>) -> Self {
        let router = EventRouter::new(id, bus);
        let timeout = TimeoutController::new(router.clone());

        Self {
            inner: Arc::new(SocketInner {
                id,
                transport,
                router,
                timeout,
                lifecycle: Mutex::new(Lifecycle::new(id)),
            }),
        }
    }
}

// ============================================================================
// SocketHandle - Accessors
// ============================================================================

impl SocketHandle {
    /// Returns the connection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state()
    }

    /// Returns `true` after `end` or `destroy`, until the next `connect`.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.lifecycle.lock().is_destroyed()
    }

    /// Returns the remote address of the last successful connect.
    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.inner.lifecycle.lock().address().cloned()
    }

    /// Returns the remote IP of the last successful connect.
    #[must_use]
    pub fn remote_address(&self) -> Option<String> {
        self.inner.lifecycle.lock().address().map(|a| a.ip.clone())
    }

    /// Returns the remote port of the last successful connect.
    #[must_use]
    pub fn remote_port(&self) -> Option<u16> {
        self.inner.lifecycle.lock().address().map(|a| a.port)
    }

    /// Returns the remote address family of the last successful connect.
    #[must_use]
    pub fn remote_family(&self) -> Option<String> {
        self.inner.lifecycle.lock().address().map(|a| a.family.clone())
    }

    /// Returns the number of bytes confirmed written by the transport.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.inner.lifecycle.lock().bytes_written()
    }

    /// Returns the configured idle timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout.interval()
    }
}

// ============================================================================
// SocketHandle - Listeners
// ============================================================================

impl SocketHandle {
    /// Registers a notification for every `kind` event.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.router.on(kind, Delivery::Every, callback)
    }

    /// Registers a notification for the next `kind` event only.
    pub fn once<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.router.on(kind, Delivery::Once, callback)
    }

    /// Registers a listener for received bytes.
    pub fn on_data<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.inner.router.on_data(Delivery::Every, callback)
    }

    /// Registers a listener for transport errors.
    ///
    /// The connection is destroyed on any error regardless of listeners.
    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.router.on_error(Delivery::Every, callback)
    }

    /// Registers a listener for established connections.
    pub fn on_connect<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Address) + Send + Sync + 'static,
    {
        self.inner.router.on_connect(Delivery::Every, callback)
    }

    /// Registers a listener for closes, receiving the `had_error` flag.
    pub fn on_close<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.router.on_close(Delivery::Every, callback)
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn off(&self, subscription: Subscription) -> bool {
        self.inner.router.off(subscription)
    }
}

// ============================================================================
// SocketHandle - Lifecycle
// ============================================================================

impl SocketHandle {
    /// Starts connecting.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if already connecting or connected.
    pub fn connect(&self, options: ConnectOptions) -> Result<&Self> {
        self.inner.start_connect(&options, None)?;
        Ok(self)
    }

    /// Starts connecting; `callback` runs once when the connection is
    /// established.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if already connecting or connected.
    pub fn connect_with<F>(&self, options: ConnectOptions, callback: F) -> Result<&Self>
    where
        F: FnOnce(&Address) + Send + 'static,
    {
        self.inner.start_connect(&options, Some(Box::new(callback)))?;
        Ok(self)
    }

    /// Connects and waits for the connection to be established.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if already connecting or connected
    /// - [`Error::ConnectionClosed`] if the attempt is destroyed or closed
    ///   first
    pub async fn connect_async(&self, options: ConnectOptions) -> Result<Address> {
        let (tx, rx) = oneshot::channel();
        let callback: ConnectCallback = Box::new(move |address: &Address| {
            let _ = tx.send(address.clone());
        });

        self.inner.start_connect(&options, Some(callback))?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    /// Half-closes the connection. No-op once ended or destroyed.
    pub fn end(&self) {
        self.inner.end();
    }

    /// Writes `payload`, then half-closes. No-op once ended or destroyed.
    ///
    /// # Errors
    ///
    /// Same as [`SocketHandle::write`]; the socket is not ended on error.
    pub fn end_with(&self, payload: impl Into<Payload>) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }
        self.inner.write(&payload.into(), None)?;
        self.inner.end();
        Ok(())
    }

    /// Closes the connection immediately. No-op once ended or destroyed.
    pub fn destroy(&self) {
        self.inner.destroy();
    }
}

// ============================================================================
// SocketHandle - Writing
// ============================================================================

impl SocketHandle {
    /// Writes `payload`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if disconnected
    /// - [`Error::WriteAfterEnd`] if ended
    /// - [`Error::InvalidEncodedData`] if a text payload is malformed
    pub fn write(&self, payload: impl Into<Payload>) -> Result<()> {
        self.inner.write(&payload.into(), None)
    }

    /// Writes `payload`; `callback` receives the transport's outcome.
    ///
    /// # Errors
    ///
    /// Same as [`SocketHandle::write`]; `callback` is not called then.
    pub fn write_with<F>(&self, payload: impl Into<Payload>, callback: F) -> Result<()>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.inner.write(&payload.into(), Some(Box::new(callback)))
    }

    /// Writes `payload` and waits for the transport's outcome.
    ///
    /// # Errors
    ///
    /// Same as [`SocketHandle::write`], plus the transport's error and
    /// [`Error::ChannelClosed`] if the transport drops the completion.
    pub async fn write_async(&self, payload: impl Into<Payload>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.write(
            &payload.into(),
            Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        )?;
        rx.await?
    }
}

// ============================================================================
// SocketHandle - Options
// ============================================================================

impl SocketHandle {
    /// Sets the idle timeout; zero disables it.
    pub fn set_timeout(&self, timeout: Duration) -> &Self {
        self.inner.timeout.set_timeout(timeout, None);
        self
    }

    /// Sets the idle timeout with a callback for its next expiry.
    ///
    /// With a zero `timeout` the timer is disabled and callbacks from
    /// earlier calls are removed; `callback` is dropped.
    pub fn set_timeout_with<F>(&self, timeout: Duration, callback: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.timeout.set_timeout(timeout, Some(Box::new(callback)));
        self
    }

    /// Enables or disables Nagle's algorithm.
    pub fn set_no_delay(&self, no_delay: bool) -> &Self {
        self.inner.transport.set_no_delay(self.inner.id, no_delay);
        self
    }

    /// Enables or disables TCP keep-alive.
    pub fn set_keep_alive(&self, enable: bool, initial_delay: Duration) -> &Self {
        self.inner
            .transport
            .set_keep_alive(self.inner.id, enable, initial_delay);
        self
    }
}

// ============================================================================
// SocketInner - Operations
// ============================================================================

impl SocketInner {
    fn start_connect(
        self: &Arc<Self>,
        options: &ConnectOptions,
        callback: Option<ConnectCallback>,
    ) -> Result<()> {
        let register = self.lifecycle.lock().begin_connect(callback)?;
        if register {
            self.register_events();
        }

        match options.timeout {
            Some(timeout) => self.timeout.set_timeout(timeout, None),
            None => {
                self.timeout.rearm();
            }
        }

        debug!(id = %self.id, host = %options.host, port = options.port, "Connecting");
        self.transport
            .connect(self.id, &options.host, options.port, options);
        Ok(())
    }

    fn write(self: &Arc<Self>, payload: &Payload, callback: Option<WriteCallback>) -> Result<()> {
        self.lifecycle.lock().ensure_writable()?;

        let bytes = payload.to_bytes()?;
        let len = bytes.len();
        let weak = Arc::downgrade(self);

        trace!(id = %self.id, bytes = len, "Writing");
        self.transport.write(
            self.id,
            encode_wire(&bytes),
            Box::new(move |result| {
                if let Some(inner) = weak.upgrade() {
                    inner.write_completed(len, &result);
                }
                if let Some(callback) = callback {
                    callback(result);
                }
            }),
        );
        Ok(())
    }

    fn write_completed(&self, len: usize, result: &Result<()>) {
        match result {
            Ok(()) => {
                let destroyed = {
                    let mut lifecycle = self.lifecycle.lock();
                    lifecycle.record_written(len);
                    lifecycle.is_destroyed()
                };
                if !destroyed {
                    self.timeout.rearm();
                }
            }
            Err(e) => debug!(id = %self.id, error = %e, "Write failed"),
        }
    }

    fn end(&self) {
        if !self.lifecycle.lock().end() {
            trace!(id = %self.id, "Already ended");
            return;
        }
        debug!(id = %self.id, "Ending");
        self.transport.end(self.id);
    }

    fn destroy(&self) {
        if !self.lifecycle.lock().destroy() {
            trace!(id = %self.id, "Already destroyed");
            return;
        }
        self.timeout.disarm();
        debug!(id = %self.id, "Destroying");
        self.transport.destroy(self.id);
    }
}

// ============================================================================
// SocketInner - Lifecycle Events
// ============================================================================

impl SocketInner {
    /// Registers the listeners driving the state machine.
    fn register_events(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.router.on_connect(Delivery::Every, move |address| {
            if let Some(inner) = weak.upgrade() {
                inner.on_connected(address);
            }
        });

        let weak = Arc::downgrade(self);
        self.router.on_close(Delivery::Every, move |had_error| {
            if let Some(inner) = weak.upgrade() {
                inner.on_closed(had_error);
            }
        });

        let weak = Arc::downgrade(self);
        self.router.on_error(Delivery::Every, move |error| {
            if let Some(inner) = weak.upgrade() {
                warn!(id = %inner.id, error, "Connection error");
                inner.destroy();
            }
        });
    }

    fn on_connected(&self, address: &Address) {
        let callback = self.lifecycle.lock().connected(address.clone());
        trace!(id = %self.id, ip = %address.ip, port = address.port, "Connect event");
        if let Some(callback) = callback {
            callback(address);
        }
    }

    fn on_closed(&self, had_error: bool) {
        if !self.lifecycle.lock().closed() {
            return;
        }
        self.timeout.disarm();
        self.timeout.forget_callbacks();
        let released = self.router.clear();
        debug!(id = %self.id, had_error, released, "Closed");
    }
}

impl Drop for SocketInner {
    fn drop(&mut self) {
        self.timeout.disarm();
        self.router.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
