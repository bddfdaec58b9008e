//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`NodeEvent`] as one line to
//! the serial log.  A counting or radio-forwarding sink would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            NodeEvent::JoinAttempt { attempt } => {
                info!("JOIN  | attempt {}", attempt);
            }
            NodeEvent::Joined => info!("JOIN  | accepted"),
            NodeEvent::JoinRetryScheduled {
                attempt,
                delay_ms,
                cause,
            } => {
                info!(
                    "JOIN  | attempt {} failed ({}), retry in {} ms",
                    attempt, cause, delay_ms
                );
            }
            NodeEvent::JoinAbandoned => warn!("JOIN  | giving up until next wake"),
            NodeEvent::RejoinTriggered { uplinks_failed } => {
                warn!("JOIN  | {} uplinks unacknowledged, rejoining", uplinks_failed);
            }
            NodeEvent::UplinkDelivered => info!("UP    | delivered"),
            NodeEvent::UplinkFailed { count } => {
                warn!("UP    | unacknowledged (consecutive={})", count);
            }
            NodeEvent::UplinkScheduled { frame_len } => {
                info!("UP    | scheduled {} bytes", frame_len);
            }
            NodeEvent::UplinkRejected(status) => {
                warn!("UP    | rejected by MAC: {:?}", status);
            }
            NodeEvent::PayloadTooLarge { len } => {
                warn!("UP    | dropped {}-byte report, too large for any frame", len);
            }
            NodeEvent::BareAck { rssi } => info!("DOWN  | ack rssi={}", rssi),
            NodeEvent::DownlinkRouted { module, found } => {
                if *found {
                    info!("DOWN  | command for module {}", module);
                } else {
                    warn!("DOWN  | command for unknown module {}", module);
                }
            }
        }
    }
}
