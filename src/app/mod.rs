//! Application core — pure domain vocabulary, zero I/O.
//!
//! Messages flowing between tasks live in [`commands`], structured events
//! flowing out of the core live in [`events`], and every interaction with
//! hardware or the network stack goes through the **port traits** defined
//! in [`ports`], keeping the core testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
