//! Outbound node events.
//!
//! The session manager and the pipeline emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, count them, etc.

use crate::error::NetworkError;
use crate::fsm::StateId;
use crate::payload::ModuleId;

use super::ports::SendStatus;

/// Structured events emitted by the node core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// The session state machine moved between states.
    StateChanged { from: StateId, to: StateId },

    /// An attach attempt is starting.
    JoinAttempt { attempt: u8 },

    /// The network accepted the node.
    Joined,

    /// An attach failed; a retry is scheduled after `delay_ms`.
    JoinRetryScheduled { attempt: u8, delay_ms: u32, cause: NetworkError },

    /// Class-A node exhausted its join attempts and went dormant.
    JoinAbandoned,

    /// Too many unacknowledged uplinks; a fresh join was requested.
    RejoinTriggered { uplinks_failed: u8 },

    /// A confirmed uplink was acknowledged.
    UplinkDelivered,

    /// A confirmed uplink went unacknowledged.
    UplinkFailed { count: u8 },

    /// An uplink frame was handed to the MAC.
    UplinkScheduled { frame_len: usize },

    /// The MAC refused an uplink.
    UplinkRejected(SendStatus),

    /// A reply was too large for any frame and was dropped.
    PayloadTooLarge { len: usize },

    /// A zero-length acknowledgement arrived.
    BareAck { rssi: i16 },

    /// A downlink command was routed to a module.
    DownlinkRouted { module: ModuleId, found: bool },
}
