//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements       | Connects to                 |
//! |------------|------------------|-----------------------------|
//! | `log_sink` | EventSink        | Serial log output           |
//! | `nvs`      | StoragePort      | In-memory key-value store   |
//! | `sim`      | NetworkPort      | Simulated LoRaWAN MAC       |
//! |            | DiagnosticsPort  | Fixed health readings       |
//! |            | RangeFinder      | Scripted echo distances     |
//! | `time`     | (run loop clock) | Host monotonic clock        |

pub mod log_sink;
pub mod nvs;
pub mod sim;
pub mod time;
