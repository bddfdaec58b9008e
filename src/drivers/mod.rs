//! Peripheral drivers.

pub mod power_rail;
