//! Uplink/downlink pipeline.
//!
//! Downlinks are demultiplexed to a module by their first byte; replies and
//! module reports are padded into one of two fixed frame sizes with a
//! two-byte diagnostic trailer.
//!
//! ```text
//!  downlink: [module_id][sub-command][args…]
//!                │
//!                ▼ Router
//!  uplink:   [reply content…][0-padding][temp][vdd]   (16 or 32 bytes)
//! ```

use log::{debug, info, warn};

use crate::app::ports::{DiagnosticsPort, StoragePort};
use crate::error::ProtocolError;
use crate::kernel::Kernel;
use crate::modules::{Dispatch, ModuleRegistry, not_found_reply};
use crate::payload::{ModuleData, ModuleId};

/// Frame size for content shorter than 15 bytes.
pub const SMALL_FRAME: usize = 16;
/// Frame size for content shorter than 31 bytes.
pub const LARGE_FRAME: usize = 32;
/// Diagnostic bytes at the end of every frame.
pub const TRAILER_LEN: usize = 2;
/// Largest reply content that still fits a frame.
pub const MAX_CONTENT: usize = LARGE_FRAME - TRAILER_LEN;

/// An encoded uplink frame.
pub type Frame = heapless::Vec<u8, LARGE_FRAME>;

/// What became of a downlink payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Demux {
    /// Too short to address a module; treated as an acknowledgement.
    Ack,
    /// The command did not fit a module buffer.
    Dropped,
    /// Handed to the router.  `reply` is `None` when the module signalled
    /// "no data".
    Routed {
        module: ModuleId,
        found: bool,
        reply: Option<ModuleData>,
    },
}

/// Running counters, exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_encoded: u32,
    pub oversized: u32,
    pub routed: u32,
    pub not_found: u32,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Route a downlink payload to its module.
    pub fn demux(
        &mut self,
        payload: &[u8],
        rssi: i16,
        modules: &mut ModuleRegistry,
        kernel: &mut Kernel,
        storage: &mut dyn StoragePort,
    ) -> Demux {
        let [id, command @ ..] = payload else {
            return Demux::Ack;
        };
        if command.is_empty() {
            debug!("[LoRa] {}-byte downlink treated as ack", payload.len());
            return Demux::Ack;
        }
        let module = ModuleId(*id);

        let cmd = match ModuleData::from_slice(command) {
            Ok(cmd) => cmd.with_rssi(Some(rssi)),
            Err(e) => {
                warn!("[LoRa] downlink for module {} dropped: {}", module, e);
                return Demux::Dropped;
            }
        };

        self.stats.routed = self.stats.routed.wrapping_add(1);
        match modules.dispatch(module, &cmd, kernel, storage) {
            Dispatch::NotFound => {
                warn!("[LoRa] module {} not found", module);
                self.stats.not_found = self.stats.not_found.wrapping_add(1);
                Demux::Routed {
                    module,
                    found: false,
                    reply: Some(not_found_reply(module)),
                }
            }
            Dispatch::Handled(reply) => Demux::Routed {
                module,
                found: true,
                reply: reply.into_data().map(|d| d.with_ack(true)),
            },
        }
    }

    /// Pad `reply` into a frame and write the diagnostic trailer.
    pub fn encode(
        &mut self,
        reply: &ModuleData,
        diagnostics: &mut dyn DiagnosticsPort,
    ) -> Result<Frame, ProtocolError> {
        let content = reply.len();
        let Some(size) = frame_len(content) else {
            self.stats.oversized = self.stats.oversized.wrapping_add(1);
            return Err(ProtocolError::PayloadTooLarge {
                len: content,
                max: MAX_CONTENT,
            });
        };

        let overflow = ProtocolError::PayloadTooLarge {
            len: content,
            max: MAX_CONTENT,
        };
        let mut frame = Frame::new();
        frame
            .extend_from_slice(reply.as_bytes())
            .map_err(|_| overflow)?;
        frame.resize(size, 0).map_err(|_| overflow)?;

        if let Some(t) = diagnostics.mcu_temperature_c() {
            frame[size - 2] = sign_magnitude(t);
        }
        if let Some(mv) = diagnostics.supply_voltage_mv() {
            frame[size - 1] = voltage_byte(mv);
        }

        info!(
            "[LoRa] payload size {} bytes + {} status bytes -> {} bytes",
            content, TRAILER_LEN, size
        );
        self.stats.frames_encoded = self.stats.frames_encoded.wrapping_add(1);
        Ok(frame)
    }
}

/// Frame size for `content` bytes, or `None` if it cannot be sent.
pub fn frame_len(content: usize) -> Option<usize> {
    if content < SMALL_FRAME - 1 {
        Some(SMALL_FRAME)
    } else if content < LARGE_FRAME - 1 {
        Some(LARGE_FRAME)
    } else {
        None
    }
}

/// Sign-magnitude encoding: bit 7 is the sign, bits 0–6 the magnitude.
pub fn sign_magnitude(value: i8) -> u8 {
    let magnitude = value.unsigned_abs().min(0x7F);
    if value < 0 { 0x80 | magnitude } else { magnitude }
}

/// Supply voltage in 50 mV steps, saturating.
pub fn voltage_byte(mv: u16) -> u8 {
    u8::try_from(mv / 50).unwrap_or(u8::MAX)
}
