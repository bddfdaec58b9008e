//! Host monotonic clock.
//!
//! Maps wall time since construction onto the kernel's
//! [`embassy_time::Instant`] scale so the run loop can tell the kernel
//! how far time has moved.

use embassy_time::{Duration, Instant};

/// Monotonic clock anchored at construction.
pub struct MonotonicClock {
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Time since construction on the kernel's scale.
    pub fn now(&self) -> Instant {
        Instant::from_micros(self.uptime_us())
    }

    /// Microseconds since construction.
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Host duration until `deadline`, zero if it already passed.
    pub fn until(&self, deadline: Instant) -> std::time::Duration {
        let now = self.now();
        if deadline <= now {
            return std::time::Duration::ZERO;
        }
        let left: Duration = deadline - now;
        std::time::Duration::from_micros(left.as_micros())
    }
}
