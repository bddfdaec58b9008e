//! Function-pointer finite state machine engine for the network session.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────┬──────────┬──────────┬──────────────────────┐│
//! │  │ StateId      │ on_enter │ on_exit  │ on_event             ││
//! │  ├──────────────┼──────────┼──────────┼──────────────────────┤│
//! │  │ Idle         │ -        │ -        │ fn(ctx, in)->Option<>││
//! │  │ Joining      │ fn(ctx)  │ -        │ fn(ctx, in)->Option<>││
//! │  │ Joined       │ fn(ctx)  │ -        │ fn(ctx, in)->Option<>││
//! │  │ WaitingRetry │ fn(ctx)  │ -        │ fn(ctx, in)->Option<>││
//! │  │ Disabled     │ fn(ctx)  │ -        │ fn(ctx, in)->Option<>││
//! │  └──────────────┴──────────┴──────────┴──────────────────────┘│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is event-driven: every [`SessionInput`] is handed to the
//! current state's `on_event`.  If it returns `Some(next_id)` the engine runs
//! `on_exit` for the current state, then `on_enter` for the next, even when
//! `next_id` is the current state (a fresh join attempt re-enters
//! `Joining`).  Handlers never perform I/O; they push
//! [`SessionAction`](context::SessionAction)s onto the context for the
//! session manager to execute.

pub mod context;
pub mod states;

use context::{SessionContext, SessionInput};
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every state of the join/retry state machine.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Joining = 1,
    Joined = 2,
    WaitingRetry = 3,
    /// Class-A only: join attempts exhausted, waiting for an explicit join.
    Disabled = 4,
}

impl StateId {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 5;

    /// Convert an index back to `StateId`.  Out-of-range indices assert in
    /// debug builds and map to `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Joining,
            2 => Self::Joined,
            3 => Self::WaitingRetry,
            4 => Self::Disabled,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut SessionContext);

/// Signature for the per-input handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateEventFn = fn(&mut SessionContext, &SessionInput) -> Option<StateId>;

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The session state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    pub fn start(&mut self, ctx: &mut SessionContext) {
        info!("[LoRa] session starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Feed one input to the current state.  Returns the state entered, if a
    /// transition was taken.
    pub fn dispatch(&mut self, input: &SessionInput, ctx: &mut SessionContext) -> Option<StateId> {
        let next = (self.table[self.current].on_event)(ctx, input)?;
        self.transition(next, ctx);
        Some(next)
    }

    /// Jump straight to `next`, running exit/enter actions.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut SessionContext) {
        self.transition(next, ctx);
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    fn transition(&mut self, next_id: StateId, ctx: &mut SessionContext) {
        let next_idx = next_id as usize;

        info!(
            "[LoRa] session: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
