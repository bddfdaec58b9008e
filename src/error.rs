//! Unified error types for the node firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level run loop's error handling uniform.  All variants are `Copy` so
//! they can be logged and passed around without allocation.
//!
//! None of these ever terminates the node: network errors are absorbed by
//! the session state machine, protocol errors become a logged drop or a
//! synthesized reply, and storage errors fall back to factory defaults.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The network stack refused or failed an operation.
    Network(NetworkError),
    /// A payload or command violated the wire contract.
    Protocol(ProtocolError),
    /// Persistent configuration could not be read or written.
    Store(StoreError),
    /// The mailbox runtime could not accept a message or task.
    Kernel(KernelError),
    /// The command table rejected a registration or lookup.
    Shell(ShellError),
    /// The module table rejected a registration.
    Registry(RegistryError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Kernel(e) => write!(f, "kernel: {e}"),
            Self::Shell(e) => write!(f, "shell: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Network errors (recoverable, handled by retry/backoff)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// MAC layer is busy with another operation.
    Busy,
    /// Duty-cycle or regional restriction prevented the operation.
    Restricted,
    /// The node has no active session.
    NotJoined,
    /// The network rejected the join request.
    JoinRejected,
    /// A status code this firmware does not know about.
    Unknown(i32),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "MAC busy"),
            Self::Restricted => write!(f, "restricted"),
            Self::NotJoined => write!(f, "not joined"),
            Self::JoinRejected => write!(f, "join rejected"),
            Self::Unknown(code) => write!(f, "unknown status {code}"),
        }
    }
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Reply content does not fit in the largest uplink frame.
    PayloadTooLarge { len: usize, max: usize },
    /// Data does not fit in a module data buffer.
    CapacityExceeded { len: usize, capacity: usize },
    /// Hex text could not be decoded.
    InvalidHex,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload too big: {len} bytes ({max} bytes max)")
            }
            Self::CapacityExceeded { len, capacity } => {
                write!(f, "{len} bytes exceed buffer capacity {capacity}")
            }
            Self::InvalidHex => write!(f, "invalid hex"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Persistent store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// No record has ever been written for this key.
    Absent,
    /// Validity marker, schema version or body failed to check out.
    Corrupt,
    /// The serialized body does not fit in a record.
    RecordTooLarge,
    /// The storage backend reported an I/O failure.
    Backend,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "record absent"),
            Self::Corrupt => write!(f, "record corrupt"),
            Self::RecordTooLarge => write!(f, "record too large"),
            Self::Backend => write!(f, "storage backend failure"),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Kernel (mailbox runtime) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Destination mailbox is at capacity; the message was dropped.
    MailboxFull,
    /// No task with this id has been spawned.
    UnknownTask,
    /// The task table is full.
    TooManyTasks,
    /// The deferred-message table is full.
    TooManyTimers,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MailboxFull => write!(f, "mailbox full"),
            Self::UnknownTask => write!(f, "unknown task"),
            Self::TooManyTasks => write!(f, "task table full"),
            Self::TooManyTimers => write!(f, "timer table full"),
        }
    }
}

impl From<KernelError> for Error {
    fn from(e: KernelError) -> Self {
        Self::Kernel(e)
    }
}

// ---------------------------------------------------------------------------
// Shell command table errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellError {
    /// A command with this name is already registered.
    Duplicate,
    /// The command table has no free slots.
    TableFull,
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate command"),
            Self::TableFull => write!(f, "command table full"),
        }
    }
}

impl From<ShellError> for Error {
    fn from(e: ShellError) -> Self {
        Self::Shell(e)
    }
}

// ---------------------------------------------------------------------------
// Module registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Another module already uses this identifier.
    DuplicateModule(u8),
    /// The module table has no free slots.
    TooManyModules,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateModule(id) => write!(f, "module {id} already registered"),
            Self::TooManyModules => write!(f, "module table full"),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl core::error::Error for Error {}
impl core::error::Error for NetworkError {}
impl core::error::Error for ProtocolError {}
impl core::error::Error for StoreError {}
impl core::error::Error for KernelError {}
impl core::error::Error for ShellError {}
impl core::error::Error for RegistryError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
