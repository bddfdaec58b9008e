//! Mailbox messages exchanged between the node's tasks.
//!
//! Every interaction between tasks (network events, periodic timer
//! expiries, module reports, explicit join requests) is one of these
//! messages, posted immediately or scheduled for later delivery through
//! the [`Kernel`](crate::kernel::Kernel).

use crate::events::NetworkEvent;
use crate::payload::{ModuleData, ModuleId};

/// One of the independently scheduled cycles a module runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleTask {
    /// Primary report cycle with a configurable period.
    Regular,
    /// Fixed-interval liveness report.
    Heartbeat,
}

/// Address of a task mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// The session manager: sole owner of the network handle.
    Session,
    /// One periodic cycle of one module.
    Module(ModuleId, ModuleTask),
}

/// Why a join was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReason {
    /// Boot-time join.
    Startup,
    /// Operator `join` command.
    Command,
    /// Deferred retry after a failed attempt.
    Retry,
    /// A send reported the node was not joined.
    NotJoined,
}

/// Why a module task woke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Its own periodic timer fired.
    Timer,
    /// An explicit poll command asked for an immediate report.
    Poll,
}

/// A message in a task mailbox.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Request a network attach.
    Join(JoinReason),
    /// Asynchronous event from the network stack.
    Network(NetworkEvent),
    /// A module report headed for the uplink.
    Publish(ModuleData),
    /// Wake a module task.
    Wake(WakeReason),
    /// Switch into the constrained low-power mode.
    EnterLowPower,
}
