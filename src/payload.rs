//! Module data buffers — the unit of exchange between modules, the
//! router, the uplink/downlink pipeline and the config store.
//!
//! [`ModuleData`] carries both commands into a module and replies/reports
//! out of it.  The backing store is a fixed-capacity `heapless::Vec`, so
//! the length can never exceed the capacity and bytes past the length do
//! not exist as far as the rest of the firmware is concerned.

use core::fmt;

use crate::error::ProtocolError;

/// Maximum number of bytes a single module command or reply may carry.
pub const MODULE_DATA_CAPACITY: usize = 128;

/// Status byte of a successful module reply (`{module_id, 0x00}`).
pub const REPLY_OK: u8 = 0x00;

/// Status byte of a failed module reply (`{module_id, 0xFF}`).
pub const REPLY_FAIL: u8 = 0xFF;

/// First byte of the reply synthesized for an unknown module identifier.
pub const NOT_FOUND_CODE: u8 = 0xFE;

/// Small integer identifying a module within the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u8);

impl ModuleId {
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bounded command or reply buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleData {
    data: heapless::Vec<u8, MODULE_DATA_CAPACITY>,
    /// The uplink carrying this data acknowledges a downlink.
    pub as_ack: bool,
    /// Signal strength of the downlink this command arrived on, if any.
    pub rssi: Option<i16>,
}

impl ModuleData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `bytes` into a fresh buffer.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut out = Self::new();
        out.extend_from_slice(bytes)?;
        Ok(out)
    }

    /// Decode an even-length hex string, as typed at the shell.
    pub fn from_hex(text: &str) -> Result<Self, ProtocolError> {
        if text.len() % 2 != 0 {
            return Err(ProtocolError::InvalidHex);
        }
        let len = text.len() / 2;
        if len > MODULE_DATA_CAPACITY {
            return Err(ProtocolError::CapacityExceeded {
                len,
                capacity: MODULE_DATA_CAPACITY,
            });
        }
        let bytes = hex::decode(text).map_err(|_| ProtocolError::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Two-byte status reply `{module_id, status}`.
    pub fn status_reply(id: ModuleId, status: u8) -> Self {
        let mut out = Self::new();
        // Two bytes always fit.
        let _ = out.data.push(id.raw());
        let _ = out.data.push(status);
        out
    }

    pub fn with_ack(mut self, as_ack: bool) -> Self {
        self.as_ack = as_ack;
        self
    }

    pub fn with_rssi(mut self, rssi: Option<i16>) -> Self {
        self.rssi = rssi;
        self
    }

    pub fn push(&mut self, byte: u8) -> Result<(), ProtocolError> {
        self.data.push(byte).map_err(|_| ProtocolError::CapacityExceeded {
            len: self.data.len() + 1,
            capacity: MODULE_DATA_CAPACITY,
        })
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.data
            .extend_from_slice(bytes)
            .map_err(|()| ProtocolError::CapacityExceeded {
                len: self.data.len() + bytes.len(),
                capacity: MODULE_DATA_CAPACITY,
            })
    }

    /// The valid bytes of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// First byte, conventionally the sub-command of a module command.
    pub fn first(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Lowercase hex rendering for logs.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }
}
