//! Switched sensor supply rail.
//!
//! The ultrasonic front end sits behind a load switch.  The rail is kept
//! off between measurements and must settle before the transducer is
//! initialised or fired.
//!
//! Generic over any `embedded-hal` 1.0 output pin and delay, so the same
//! driver runs against real GPIO and against the host simulation.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, warn};

use crate::app::ports::PowerControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailState {
    Off,
    On,
}

pub struct PowerRail<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    enable: P,
    delay: D,
    active_low: bool,
    state: RailState,
}

impl<P, D> PowerRail<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Rail whose enable pin is driven high to switch on.
    pub fn active_high(enable: P, delay: D) -> Self {
        Self::with_polarity(enable, delay, false)
    }

    /// Rail whose enable pin is pulled low to switch on.
    pub fn active_low(enable: P, delay: D) -> Self {
        Self::with_polarity(enable, delay, true)
    }

    fn with_polarity(enable: P, delay: D, active_low: bool) -> Self {
        let mut rail = Self {
            enable,
            delay,
            active_low,
            state: RailState::On,
        };
        rail.disable();
        rail
    }

    pub fn state(&self) -> RailState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        self.state == RailState::On
    }

    /// The enable pin, for inspection.
    pub fn pin(&self) -> &P {
        &self.enable
    }

    fn drive(&mut self, on: bool) -> bool {
        let high = on != self.active_low;
        let result = if high {
            self.enable.set_high()
        } else {
            self.enable.set_low()
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("[rail] enable pin write failed: {:?}", e.kind());
                false
            }
        }
    }
}

impl<P, D> PowerControl for PowerRail<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    fn enable_and_settle(&mut self, settle_ms: u32) {
        if !self.drive(true) {
            return;
        }
        self.state = RailState::On;
        debug!("[rail] on, settling {} ms", settle_ms);
        self.delay.delay_ms(settle_ms);
    }

    fn disable(&mut self) {
        if self.drive(false) {
            self.state = RailState::Off;
        }
    }
}
