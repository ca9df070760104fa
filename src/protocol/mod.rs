//! Wire-level types shared with the transport.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`Event`] | Transport → Socket | Lifecycle and data notifications |
//! | wire text | Socket → Transport | Base64 outbound bytes |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Event, EventKind, EventPayload, Address |
//! | `payload` | Payload normalization and wire encoding |

// ============================================================================
// Submodules
// ============================================================================

/// Event message types.
pub mod event;

/// Outbound payloads and wire encoding.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{Address, Event, EventKind, EventPayload};
pub use payload::{Encoding, Payload, decode_wire, encode_wire};
