//! Network-stack event ingress.
//!
//! Events are produced by the LoRaWAN MAC in its own execution context
//! (radio interrupts, MAC timers) and consumed by the node's run loop,
//! which forwards them into the session task's mailbox.
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ TX done     │────▶│                │     │              │
//! │ TX cnf fail │────▶│ NETWORK_EVENTS │────▶│ Session task │
//! │ RX          │────▶│ (embassy-sync) │     │  (consumer)  │
//! │ Join notify │────▶│                │     │              │
//! └─────────────┘     └────────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Largest application payload a downlink can carry.
pub const DOWNLINK_CAPACITY: usize = 242;

/// Maximum number of pending network events.
const NETWORK_EVENT_DEPTH: usize = 8;

/// A received downlink frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Downlink {
    pub payload: heapless::Vec<u8, DOWNLINK_CAPACITY>,
    /// The frame acknowledged a confirmed uplink.
    pub ack: bool,
    pub rssi: i16,
    pub datarate: u8,
    pub port: u8,
}

impl Downlink {
    /// Build a downlink from raw bytes, truncating to [`DOWNLINK_CAPACITY`].
    pub fn from_bytes(bytes: &[u8], ack: bool, rssi: i16) -> Self {
        let len = bytes.len().min(DOWNLINK_CAPACITY);
        let mut payload = heapless::Vec::new();
        // Length clamped above.
        let _ = payload.extend_from_slice(&bytes[..len]);
        Self {
            payload,
            ack,
            rssi,
            datarate: 0,
            port: 2,
        }
    }

    pub fn is_bare_ack(&self) -> bool {
        self.payload.is_empty() && self.ack
    }
}

/// Asynchronous notifications from the network stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// An uplink finished transmitting (and was acknowledged, if confirmed).
    TxDone,
    /// A confirmed uplink exhausted its retransmissions unacknowledged.
    TxConfirmedFailed,
    /// Application data or a bare acknowledgement arrived.
    Downlink(Downlink),
    /// The MAC reports a join-related state change.
    JoinNotification,
    /// An event type this firmware does not know about.
    Other(u16),
}

/// Bounded queue from the MAC context into the node run loop.
pub static NETWORK_EVENTS: Channel<CriticalSectionRawMutex, NetworkEvent, NETWORK_EVENT_DEPTH> =
    Channel::new();

/// Push an event from the MAC context.
/// Returns `false` if the queue is full (event dropped).
pub fn push_network_event(event: NetworkEvent) -> bool {
    NETWORK_EVENTS.try_send(event).is_ok()
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_network_events(mut handler: impl FnMut(NetworkEvent)) {
    while let Ok(event) = NETWORK_EVENTS.try_receive() {
        handler(event);
    }
}
