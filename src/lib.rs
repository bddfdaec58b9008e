//! LoRaNode firmware library.
//!
//! The control core of a battery-powered LoRaWAN sensor node: join/retry
//! session state machine, uplink/downlink pipeline, module registry and
//! periodic sensor reporting.  Hardware and the radio MAC sit behind the
//! port traits in [`app::ports`]; the `adapters` and `drivers` modules hold
//! the host implementations.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod kernel;
pub mod modules;
pub mod node;
pub mod payload;
pub mod pipeline;
pub mod session;
pub mod shell;
pub mod store;
