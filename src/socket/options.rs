//! Connection options and normalization.
//!
//! Provides a type-safe interface for the parameters handed to the
//! transport on connect, plus lenient normalization from loosely-typed
//! JSON input.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use evented_tcp::ConnectOptions;
//!
//! let options = ConnectOptions::new("example.com", 80)
//!     .with_local_port(40000)
//!     .with_timeout(Duration::from_secs(30));
//!
//! let loose = ConnectOptions::from_json(r#"{"host":"example.com","port":"80"}"#)?;
//! assert_eq!(loose.port, 80);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Host used when none is given.
pub const DEFAULT_HOST: &str = "localhost";

/// Local bind address used when none is given.
pub const DEFAULT_LOCAL_ADDRESS: &str = "0.0.0.0";

// ============================================================================
// ConnectOptions
// ============================================================================

/// Parameters of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Remote host name or address.
    pub host: String,

    /// Remote port.
    pub port: u16,

    /// Local port to bind (0 lets the OS choose).
    pub local_port: u16,

    /// Local address to bind.
    pub local_address: String,

    /// Network interface to bind (empty for any).
    pub interface: String,

    /// Idle timeout armed once connecting starts.
    pub timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            local_port: 0,
            local_address: DEFAULT_LOCAL_ADDRESS.to_string(),
            interface: String::new(),
            timeout: None,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectOptions {
    /// Creates options for `host:port` with every other field defaulted.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Normalizes loosely-typed options.
    ///
    /// Missing or invalid fields take their defaults. Numeric fields
    /// accept numbers (truncated) and numeric strings; negative,
    /// non-finite or out-of-range values become 0. A `timeout` that does
    /// not coerce to a positive number of milliseconds means no timeout.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name);

        Self {
            host: coerce_string(field("host")).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: coerce_port(field("port")),
            local_port: coerce_port(field("localPort")),
            local_address: coerce_string(field("localAddress"))
                .unwrap_or_else(|| DEFAULT_LOCAL_ADDRESS.to_string()),
            interface: coerce_string(field("interface")).unwrap_or_default(),
            timeout: field("timeout")
                .and_then(coerce_u64)
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
        }
    }

    /// Parses and normalizes options from JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Json`](crate::Error::Json) if `text` is not valid JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectOptions {
    /// Sets the remote host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the remote port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the local port to bind.
    #[inline]
    #[must_use]
    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = local_port;
        self
    }

    /// Sets the local address to bind.
    #[inline]
    #[must_use]
    pub fn with_local_address(mut self, local_address: impl Into<String>) -> Self {
        self.local_address = local_address.into();
        self
    }

    /// Sets the network interface to bind.
    #[inline]
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Sets the idle timeout. A zero duration clears it.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

// ============================================================================
// Coercion
// ============================================================================

/// Non-empty string field.
fn coerce_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Non-negative integer from a number or numeric string.
fn coerce_u64(value: &Value) -> Option<u64> {
    let float = match value {
        Value::Number(n) => {
            if let Some(int) = n.as_u64() {
                return Some(int);
            }
            n.as_f64()?
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    (float.is_finite() && float >= 0.0).then(|| float.trunc() as u64)
}

/// Port number, 0 when invalid.
fn coerce_port(value: Option<&Value>) -> u16 {
    value
        .and_then(coerce_u64)
        .and_then(|n| u16::try_from(n).ok())
        .unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================
