//! Host simulation adapters.
//!
//! Stand-ins for the radio MAC, ADC channels, transducer and GPIO so the
//! node can run end to end on a development machine.  Completion events
//! travel through [`NETWORK_EVENTS`](crate::events::NETWORK_EVENTS) exactly
//! as the real MAC's callbacks would deliver them.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{debug, info, warn};

use crate::app::ports::{
    AttachStatus, DiagnosticsPort, EchoParams, NetworkPort, RangeFinder, SendStatus,
};
use crate::config::Activation;
use crate::events::{NetworkEvent, push_network_event};

// ── Network ───────────────────────────────────────────────────

/// MAC stand-in: rejects the first `join_failures` attaches, then accepts.
/// Every uplink sent while joined completes with `TxDone`.
#[derive(Debug)]
pub struct SimulatedMac {
    join_failures: u8,
    joined: bool,
    frames_sent: u32,
    notify: fn(NetworkEvent) -> bool,
}

impl SimulatedMac {
    pub fn new(join_failures: u8) -> Self {
        Self {
            join_failures,
            joined: false,
            frames_sent: 0,
            notify: push_network_event,
        }
    }

    /// Route completion events somewhere other than the global queue.
    pub fn with_notifier(mut self, notify: fn(NetworkEvent) -> bool) -> Self {
        self.notify = notify;
        self
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }
}

impl NetworkPort for SimulatedMac {
    fn attach(&mut self, mode: Activation) -> AttachStatus {
        if self.join_failures > 0 {
            self.join_failures -= 1;
            debug!("[sim-mac] {:?} join timed out", mode);
            return AttachStatus::NotJoined;
        }
        self.joined = true;
        (self.notify)(NetworkEvent::JoinNotification);
        AttachStatus::Success
    }

    fn send(&mut self, payload: &[u8], ack: bool) -> SendStatus {
        if !self.joined {
            return SendStatus::NotJoined;
        }
        self.frames_sent += 1;
        info!(
            "[sim-mac] uplink #{} ({} bytes{}): {}",
            self.frames_sent,
            payload.len(),
            if ack { ", ack" } else { "" },
            hex::encode(payload)
        );
        if !(self.notify)(NetworkEvent::TxDone) {
            warn!("[sim-mac] event queue full, TxDone lost");
        }
        SendStatus::Scheduled
    }
}

// ── Diagnostics ───────────────────────────────────────────────

/// Fixed health readings.
#[derive(Debug, Clone, Copy)]
pub struct SimDiagnostics {
    pub temperature_c: Option<i8>,
    pub supply_mv: Option<u16>,
}

impl Default for SimDiagnostics {
    fn default() -> Self {
        Self {
            temperature_c: Some(23),
            supply_mv: Some(3300),
        }
    }
}

impl DiagnosticsPort for SimDiagnostics {
    fn mcu_temperature_c(&mut self) -> Option<i8> {
        self.temperature_c
    }

    fn supply_voltage_mv(&mut self) -> Option<u16> {
        self.supply_mv
    }
}

// ── Range finder ──────────────────────────────────────────────

/// Transducer stand-in that walks a fixed list of echo distances.
#[derive(Debug)]
pub struct SimRangeFinder {
    readings: &'static [i32],
    next: usize,
    params: Option<EchoParams>,
}

impl SimRangeFinder {
    pub fn new(readings: &'static [i32]) -> Self {
        Self {
            readings,
            next: 0,
            params: None,
        }
    }

    pub fn params(&self) -> Option<EchoParams> {
        self.params
    }
}

impl RangeFinder for SimRangeFinder {
    fn init(&mut self, params: &EchoParams) -> bool {
        self.params = Some(*params);
        !self.readings.is_empty()
    }

    fn configure(&mut self, params: &EchoParams) {
        self.params = Some(*params);
    }

    fn measure(&mut self) -> i32 {
        let Some(&mm) = self.readings.get(self.next) else {
            return -1;
        };
        self.next = (self.next + 1) % self.readings.len();
        mm
    }
}

// ── GPIO and delay ────────────────────────────────────────────

/// Output pin that only remembers its level.
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
}

impl SimPin {
    pub fn is_high(&self) -> bool {
        self.high
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

/// Blocking delay on the host thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
