//! Shared mutable context threaded through every session state handler.
//!
//! `SessionContext` is the blackboard the state handlers read from and
//! write to: the join counters, the active node settings, and two outboxes
//! (actions for the session manager to execute, events for the sink).

use heapless::Vec;

use crate::app::commands::JoinReason;
use crate::app::events::NodeEvent;
use crate::app::ports::AttachStatus;
use crate::config::{Activation, NodeClass, NodeSettings};
use crate::error::NetworkError;

/// Join bookkeeping owned by the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinState {
    /// Join attempts since the last success, saturating at the backoff
    /// retry ceiling.
    pub retries: u8,
    /// Consecutive unacknowledged confirmed uplinks while joined.
    pub uplinks_failed: u8,
    pub class: NodeClass,
}

impl JoinState {
    pub fn new(class: NodeClass) -> Self {
        Self {
            retries: 0,
            uplinks_failed: 0,
            class,
        }
    }

    pub fn reset_counters(&mut self) {
        self.retries = 0;
        self.uplinks_failed = 0;
    }
}

/// Side effects requested by a state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Call `attach` on the network port.
    Attach(Activation),
    /// Post a deferred join after a random delay in `[lower_ms, upper_ms)`.
    ScheduleRetry {
        lower_ms: u32,
        upper_ms: u32,
        attempt: u8,
        cause: NetworkError,
    },
}

/// Inputs the state machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    JoinRequested(JoinReason),
    AttachOutcome(AttachStatus),
    /// An uplink completed (acknowledged, when confirmed).
    UplinkAcked,
    /// An uplink counted as lost under the active failure policy.
    UplinkFailed,
    EnterLowPower,
}

const ACTION_DEPTH: usize = 4;
const EVENT_DEPTH: usize = 8;

/// The context passed to every state handler.
pub struct SessionContext {
    pub join: JoinState,
    pub settings: NodeSettings,
    /// Cause of the most recent recoverable attach failure.
    pub last_failure: Option<NetworkError>,
    pub actions: Vec<SessionAction, ACTION_DEPTH>,
    pub events: Vec<NodeEvent, EVENT_DEPTH>,
}

impl SessionContext {
    pub fn new(settings: NodeSettings) -> Self {
        Self {
            join: JoinState::new(settings.class),
            settings,
            last_failure: None,
            actions: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn act(&mut self, action: SessionAction) {
        if self.actions.push(action).is_err() {
            log::warn!("[LoRa] session action queue full, dropping {:?}", action);
        }
    }

    pub fn emit(&mut self, event: NodeEvent) {
        // The manager drains after every input; overflow only loses telemetry.
        let _ = self.events.push(event);
    }

    pub fn is_class_a(&self) -> bool {
        self.join.class == NodeClass::A
    }
}
