//! Concrete session state handlers and table builder.
//!
//! ```text
//!            ┌──────────[join request, any state]───────────┐
//!            ▼                                              │
//!  IDLE ──▶ JOINING ──[attach ok]──▶ JOINED ◀─[uplink ok]─┐ │
//!            │  ▲                     │  └────────────────┘ │
//!   [recoverable]  [deferred join]    └─[uplinks lost > max_retr]──▶ JOINING
//!            ▼  │
//!       WAITING_RETRY
//!            │
//!  JOINING ──[class A, retries > max_retr]──▶ DISABLED
//! ```
//!
//! Low-power entry is accepted in every state: it resets both counters and
//! forces class A, in the join state and the active settings alike, without
//! changing state.

use log::{debug, info, warn};

use super::context::{SessionAction, SessionContext, SessionInput};
use super::{StateDescriptor, StateId};
use crate::app::events::NodeEvent;
use crate::app::ports::AttachStatus;
use crate::config::NodeClass;
use crate::error::NetworkError;
use crate::session::backoff;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_event: idle_event,
        },
        StateDescriptor {
            id: StateId::Joining,
            name: "Joining",
            on_enter: Some(joining_enter),
            on_exit: None,
            on_event: joining_event,
        },
        StateDescriptor {
            id: StateId::Joined,
            name: "Joined",
            on_enter: Some(joined_enter),
            on_exit: None,
            on_event: joined_event,
        },
        StateDescriptor {
            id: StateId::WaitingRetry,
            name: "WaitingRetry",
            on_enter: Some(waiting_enter),
            on_exit: None,
            on_event: waiting_event,
        },
        StateDescriptor {
            id: StateId::Disabled,
            name: "Disabled",
            on_enter: Some(disabled_enter),
            on_exit: None,
            on_event: disabled_event,
        },
    ]
}

/// Inputs every state handles the same way.  Returns `Some` when the input
/// was consumed here.
fn common_event(ctx: &mut SessionContext, input: &SessionInput) -> Option<Option<StateId>> {
    match input {
        SessionInput::JoinRequested(reason) => {
            debug!("[LoRa] join requested ({:?})", reason);
            Some(Some(StateId::Joining))
        }
        SessionInput::EnterLowPower => {
            info!("[LoRa] entering low-power mode, switching to class A");
            ctx.join.reset_counters();
            ctx.join.class = NodeClass::A;
            ctx.settings.class = NodeClass::A;
            Some(None)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_event(ctx: &mut SessionContext, input: &SessionInput) -> Option<StateId> {
    if let Some(next) = common_event(ctx, input) {
        return next;
    }
    debug!("[LoRa] idle: ignoring {:?}", input);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  JOINING — one attach attempt in flight
// ═══════════════════════════════════════════════════════════════════════════

fn joining_enter(ctx: &mut SessionContext) {
    let ceiling = ctx.settings.backoff.retry_ceiling;
    if ctx.join.retries < ceiling {
        ctx.join.retries += 1;
    }
    let attempt = ctx.join.retries;

    if ctx.is_class_a() {
        info!(
            "[LoRa] joining, attempt {} / {}",
            attempt,
            u16::from(ctx.settings.max_retr) + 1
        );
    } else {
        info!("[LoRa] joining, attempt {}", attempt);
    }
    ctx.emit(NodeEvent::JoinAttempt { attempt });
    ctx.act(SessionAction::Attach(ctx.settings.activation));
}

fn joining_event(ctx: &mut SessionContext, input: &SessionInput) -> Option<StateId> {
    if let Some(next) = common_event(ctx, input) {
        return next;
    }
    let SessionInput::AttachOutcome(status) = input else {
        debug!("[LoRa] joining: ignoring {:?}", input);
        return None;
    };

    if *status == AttachStatus::Success {
        return Some(StateId::Joined);
    }
    let Some(cause) = status.recoverable_error() else {
        warn!("[LoRa] attach returned unknown status {:?}, ignoring", status);
        return None;
    };

    warn!("[LoRa] join failed: {}", cause);
    ctx.last_failure = Some(cause);
    if ctx.is_class_a() && ctx.join.retries > ctx.settings.max_retr {
        return Some(StateId::Disabled);
    }
    Some(StateId::WaitingRetry)
}

// ═══════════════════════════════════════════════════════════════════════════
//  JOINED
// ═══════════════════════════════════════════════════════════════════════════

fn joined_enter(ctx: &mut SessionContext) {
    info!("[LoRa] successfully joined to the network");
    ctx.join.reset_counters();
    ctx.last_failure = None;
    ctx.emit(NodeEvent::Joined);
}

fn joined_event(ctx: &mut SessionContext, input: &SessionInput) -> Option<StateId> {
    if let Some(next) = common_event(ctx, input) {
        return next;
    }
    match input {
        SessionInput::UplinkAcked => {
            ctx.emit(NodeEvent::UplinkDelivered);
            None
        }
        SessionInput::UplinkFailed => {
            ctx.join.uplinks_failed = ctx.join.uplinks_failed.saturating_add(1);
            let failed = ctx.join.uplinks_failed;
            warn!("[LoRa] uplink not delivered ({} in a row)", failed);
            ctx.emit(NodeEvent::UplinkFailed { count: failed });

            if failed > ctx.settings.max_retr {
                info!("[LoRa] too many uplinks lost, rejoining");
                ctx.emit(NodeEvent::RejoinTriggered {
                    uplinks_failed: failed,
                });
                ctx.join.reset_counters();
                return Some(StateId::Joining);
            }
            None
        }
        _ => {
            debug!("[LoRa] joined: ignoring {:?}", input);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAITING_RETRY — a deferred join is pending
// ═══════════════════════════════════════════════════════════════════════════

fn waiting_enter(ctx: &mut SessionContext) {
    let attempt = ctx.join.retries;
    let b = backoff::bounds(&ctx.settings.backoff, attempt);
    ctx.act(SessionAction::ScheduleRetry {
        lower_ms: b.lower_ms,
        upper_ms: b.upper_ms,
        attempt,
        cause: ctx.last_failure.unwrap_or(NetworkError::NotJoined),
    });
}

fn waiting_event(ctx: &mut SessionContext, input: &SessionInput) -> Option<StateId> {
    if let Some(next) = common_event(ctx, input) {
        return next;
    }
    debug!("[LoRa] waiting for retry: ignoring {:?}", input);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISABLED — class A gave up; only an explicit join leaves this state
// ═══════════════════════════════════════════════════════════════════════════

fn disabled_enter(ctx: &mut SessionContext) {
    info!("[LoRa] maximum join retries exceeded, stopping");
    ctx.join.retries = 0;
    ctx.emit(NodeEvent::JoinAbandoned);
}

fn disabled_event(ctx: &mut SessionContext, input: &SessionInput) -> Option<StateId> {
    if let Some(next) = common_event(ctx, input) {
        return next;
    }
    debug!("[LoRa] disabled: ignoring {:?}", input);
    None
}
