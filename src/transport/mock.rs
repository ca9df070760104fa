//! Recording transport for unit tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::socket::ConnectOptions;

use super::{Transport, WriteCompletion};

/// A call made into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Connect {
        id: ConnectionId,
        host: String,
        port: u16,
    },
    Write {
        id: ConnectionId,
        data: String,
    },
    End(ConnectionId),
    Destroy(ConnectionId),
    NoDelay {
        id: ConnectionId,
        no_delay: bool,
    },
    KeepAlive {
        id: ConnectionId,
        enable: bool,
        initial_delay: Duration,
    },
}

/// Transport that records calls and holds write completions until the
/// test resolves them.
pub(crate) struct MockTransport {
    calls: Mutex<Vec<Call>>,
    pending: Mutex<Vec<WriteCompletion>>,
    auto_complete: bool,
}

impl MockTransport {
    /// Write completions wait for [`MockTransport::complete_next`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            auto_complete: false,
        })
    }

    /// Write completions succeed synchronously.
    pub fn auto_complete() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            auto_complete: true,
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(c)).count()
    }

    /// Resolves the oldest pending write. Returns `false` if none.
    pub fn complete_next(&self, result: Result<()>) -> bool {
        let completion = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                return false;
            }
            pending.remove(0)
        };
        completion(result);
        true
    }
}

impl Transport for MockTransport {
    fn connect(&self, id: ConnectionId, host: &str, port: u16, _options: &ConnectOptions) {
        self.calls.lock().push(Call::Connect {
            id,
            host: host.to_string(),
            port,
        });
    }

    fn write(&self, id: ConnectionId, data: String, on_complete: WriteCompletion) {
        self.calls.lock().push(Call::Write { id, data });
        if self.auto_complete {
            on_complete(Ok(()));
        } else {
            self.pending.lock().push(on_complete);
        }
    }

    fn end(&self, id: ConnectionId) {
        self.calls.lock().push(Call::End(id));
    }

    fn destroy(&self, id: ConnectionId) {
        self.calls.lock().push(Call::Destroy(id));
    }

    fn set_no_delay(&self, id: ConnectionId, no_delay: bool) {
        self.calls.lock().push(Call::NoDelay { id, no_delay });
    }

    fn set_keep_alive(&self, id: ConnectionId, enable: bool, initial_delay: Duration) {
        self.calls.lock().push(Call::KeepAlive {
            id,
            enable,
            initial_delay,
        });
    }
}
