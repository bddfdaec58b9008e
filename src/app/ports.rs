//! Port traits — the hexagonal boundary between the node core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SessionManager / modules (domain)
//! ```
//!
//! The network stack, diagnostic ADC channels, range-finder hardware and
//! flash storage are all external collaborators.  Driven adapters implement
//! these traits; the [`Node`](crate::node::Node) consumes them via
//! generics and hands them to the domain as trait objects, so the domain
//! core never touches hardware directly.

use crate::config::Activation;
use crate::error::NetworkError;

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: domain ↔ LoRaWAN MAC)
// ───────────────────────────────────────────────────────────────

/// Result of an attach (join) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachStatus {
    Success,
    Busy,
    Restricted,
    /// The join request timed out without an accept.
    NotJoined,
    /// The network rejected the join request.
    JoinFailed,
    /// A status code this firmware does not recognise.
    Unknown(i32),
}

impl AttachStatus {
    /// Map a failed attach onto the recoverable-network taxonomy.
    /// `None` for success and for unrecognised codes.
    pub fn recoverable_error(self) -> Option<NetworkError> {
        match self {
            Self::Busy => Some(NetworkError::Busy),
            Self::Restricted => Some(NetworkError::Restricted),
            Self::NotJoined => Some(NetworkError::NotJoined),
            Self::JoinFailed => Some(NetworkError::JoinRejected),
            Self::Success | Self::Unknown(_) => None,
        }
    }
}

/// Result of handing an uplink frame to the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Scheduled,
    Busy,
    NotJoined,
    Unknown(i32),
}

/// The single network session handle.  Owned and called exclusively by the
/// session task.
pub trait NetworkPort {
    /// Attempt to establish a session.
    fn attach(&mut self, mode: Activation) -> AttachStatus;

    /// Queue an uplink frame.  `ack` marks a frame that answers a downlink.
    fn send(&mut self, payload: &[u8], ack: bool) -> SendStatus;
}

// ───────────────────────────────────────────────────────────────
// Diagnostics port (driven adapter: MCU ADC → uplink trailer)
// ───────────────────────────────────────────────────────────────

/// Device health samples appended to every uplink frame.
pub trait DiagnosticsPort {
    /// MCU die temperature in °C, or `None` if the channel is unavailable.
    fn mcu_temperature_c(&mut self) -> Option<i8>;

    /// Supply voltage in millivolts, or `None` if unavailable.
    fn supply_voltage_mv(&mut self) -> Option<u16>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`NodeEvent`](super::events::NodeEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::NodeEvent);
}

// ───────────────────────────────────────────────────────────────
// Range finder port (driven adapter: ultrasonic transducer)
// ───────────────────────────────────────────────────────────────

/// Echo-detection parameters pushed into the range finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoParams {
    pub sensitivity: u16,
    pub min_distance_mm: u16,
    pub max_distance_mm: u16,
}

/// Ultrasonic range-finder front end.
pub trait RangeFinder {
    /// (Re)initialise the transducer.  Returns `false` if the hardware
    /// did not respond.
    fn init(&mut self, params: &EchoParams) -> bool;

    /// Update echo parameters without a full re-init.
    fn configure(&mut self, params: &EchoParams);

    /// Measure the echo distance in millimetres.  Non-positive values are
    /// physically invalid readings (no echo, out of range).
    fn measure(&mut self) -> i32;
}

/// Switchable supply for auxiliary sensor hardware.
pub trait PowerControl {
    /// Enable the rail and block for `settle_ms` so the supply stabilises.
    fn enable_and_settle(&mut self, settle_ms: u32);

    fn disable(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for node settings and module configs.
///
/// Writes are whole-record; the store does no locking because every key
/// has exactly one owner.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
