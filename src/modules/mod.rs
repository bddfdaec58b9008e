//! Module registry and command router.
//!
//! Sensor modules are a closed set of variants ([`Module`]) behind one
//! capability trait ([`SensorModule`]).  The registry is assembled once at
//! startup through [`RegistryBuilder`] and is append-only afterwards, so
//! lookups never race with registration.
//!
//! ```text
//!  downlink ──▶ Pipeline ──▶ ModuleRegistry::dispatch(id, cmd)
//!                                  │
//!                  ┌───────────────┴───────────────┐
//!             NotFound                     Handled(CommandReply)
//!         {0xFE, id} (ack)          Ok{id,0x00} · Failed{id,0xFF} · NoData
//! ```
//!
//! Modules never see the network.  Their only outlet is
//! [`ModuleCtx::publish`], which posts a report to the session task.

pub mod periodic;
pub mod ultrasound;

use embassy_time::{Duration, Instant};
use heapless::Vec;
use log::{debug, warn};

use crate::app::commands::{Message, ModuleTask, TaskId, WakeReason};
use crate::app::ports::StoragePort;
use crate::error::{KernelError, RegistryError};
use crate::kernel::Kernel;
use crate::payload::{ModuleData, ModuleId, NOT_FOUND_CODE};
use crate::shell::ShellStatus;
use crate::store::ConfigStore;

use ultrasound::UltrasoundModule;

/// Largest number of modules one node hosts.
pub const MAX_MODULES: usize = 8;

/// Outcome of a module command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// Handled; reply with this data.
    Ok(ModuleData),
    /// Rejected; reply with this data.
    Failed(ModuleData),
    /// Handled; nothing to send back.
    NoData,
}

impl CommandReply {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn into_data(self) -> Option<ModuleData> {
        match self {
            Self::Ok(d) | Self::Failed(d) => Some(d),
            Self::NoData => None,
        }
    }
}

/// Router result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    NotFound,
    Handled(CommandReply),
}

impl Dispatch {
    /// Flatten into `(handled, reply, want_reply)`.
    pub fn into_parts(self, id: ModuleId) -> (bool, ModuleData, bool) {
        match self {
            Self::NotFound => (false, not_found_reply(id), true),
            Self::Handled(CommandReply::NoData) => (true, ModuleData::new(), false),
            Self::Handled(CommandReply::Ok(d)) => (true, d, true),
            Self::Handled(CommandReply::Failed(d)) => (false, d, true),
        }
    }
}

/// The reply synthesized for a command addressed to an unknown module.
pub fn not_found_reply(id: ModuleId) -> ModuleData {
    let mut reply = ModuleData::status_reply(ModuleId(NOT_FOUND_CODE), id.raw());
    reply.as_ack = true;
    reply
}

// ───────────────────────────────────────────────────────────────
// Module context (the callback boundary)
// ───────────────────────────────────────────────────────────────

/// What a module may touch while handling a command, a wake or a shell
/// invocation: its own timers, the publish outlet and its config record.
pub struct ModuleCtx<'a> {
    id: ModuleId,
    kernel: &'a mut Kernel,
    storage: &'a mut dyn StoragePort,
}

impl<'a> ModuleCtx<'a> {
    pub fn new(id: ModuleId, kernel: &'a mut Kernel, storage: &'a mut dyn StoragePort) -> Self {
        Self {
            id,
            kernel,
            storage,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn now(&self) -> Instant {
        self.kernel.now()
    }

    /// Push a report toward the session task for uplink.
    pub fn publish(&mut self, data: ModuleData) {
        debug!("[mod {}] publishing {} bytes", self.id, data.len());
        if let Err(e) = self.kernel.post(TaskId::Session, Message::Publish(data)) {
            warn!("[mod {}] report dropped: {}", self.id, e);
        }
    }

    /// (Re)arm one of this module's timers; replaces a pending one.
    pub fn arm(&mut self, task: ModuleTask, after: Duration) -> Result<(), KernelError> {
        self.kernel.post_after(
            TaskId::Module(self.id, task),
            Message::Wake(WakeReason::Timer),
            after,
        )
    }

    /// Drop a pending timer.
    pub fn disarm(&mut self, task: ModuleTask) -> bool {
        self.kernel.cancel(TaskId::Module(self.id, task))
    }

    /// Wake one of this module's tasks right away.
    pub fn wake(&mut self, task: ModuleTask, reason: WakeReason) -> Result<(), KernelError> {
        self.kernel.post(TaskId::Module(self.id, task), Message::Wake(reason))
    }

    pub fn store(&mut self) -> ConfigStore<'_> {
        ConfigStore::new(&mut *self.storage)
    }

    /// Deadline of a pending timer, if armed.
    pub fn deadline(&self, task: ModuleTask) -> Option<Instant> {
        self.kernel.pending_deadline(TaskId::Module(self.id, task))
    }
}

// ───────────────────────────────────────────────────────────────
// Module capability
// ───────────────────────────────────────────────────────────────

/// The contract every sensor module fulfils.
pub trait SensorModule {
    fn id(&self) -> ModuleId;

    /// Shell command name.
    fn name(&self) -> &'static str;

    /// One-line shell help.
    fn help(&self) -> &'static str;

    /// Periodic tasks this module runs; the node spawns a mailbox for each.
    fn tasks(&self) -> &'static [ModuleTask];

    /// Load config, bring up hardware, arm timers.  `false` leaves the
    /// module registered but idle.
    fn init(&mut self, ctx: &mut ModuleCtx<'_>) -> bool;

    /// Handle a downlink or shell command.  `cmd[0]` is the sub-command.
    fn handle_command(&mut self, cmd: &ModuleData, ctx: &mut ModuleCtx<'_>) -> CommandReply;

    /// One of the module's tasks woke.
    fn on_wake(&mut self, task: ModuleTask, reason: WakeReason, ctx: &mut ModuleCtx<'_>);

    /// Pre-tokenized shell arguments; `args[0]` is the module's name.
    fn shell(&mut self, args: &[&str], ctx: &mut ModuleCtx<'_>) -> ShellStatus;
}

/// Every module type this firmware can host.
pub enum Module {
    Ultrasound(UltrasoundModule),
}

impl SensorModule for Module {
    fn id(&self) -> ModuleId {
        match self {
            Self::Ultrasound(m) => m.id(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Ultrasound(m) => m.name(),
        }
    }

    fn help(&self) -> &'static str {
        match self {
            Self::Ultrasound(m) => m.help(),
        }
    }

    fn tasks(&self) -> &'static [ModuleTask] {
        match self {
            Self::Ultrasound(m) => m.tasks(),
        }
    }

    fn init(&mut self, ctx: &mut ModuleCtx<'_>) -> bool {
        match self {
            Self::Ultrasound(m) => m.init(ctx),
        }
    }

    fn handle_command(&mut self, cmd: &ModuleData, ctx: &mut ModuleCtx<'_>) -> CommandReply {
        match self {
            Self::Ultrasound(m) => m.handle_command(cmd, ctx),
        }
    }

    fn on_wake(&mut self, task: ModuleTask, reason: WakeReason, ctx: &mut ModuleCtx<'_>) {
        match self {
            Self::Ultrasound(m) => m.on_wake(task, reason, ctx),
        }
    }

    fn shell(&mut self, args: &[&str], ctx: &mut ModuleCtx<'_>) -> ShellStatus {
        match self {
            Self::Ultrasound(m) => m.shell(args, ctx),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

/// Collects modules before the node starts.
#[derive(Default)]
pub struct RegistryBuilder {
    modules: Vec<Module, MAX_MODULES>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Module) -> Result<&mut Self, RegistryError> {
        let id = module.id();
        if self.modules.iter().any(|m| m.id() == id) {
            return Err(RegistryError::DuplicateModule(id.raw()));
        }
        self.modules
            .push(module)
            .map_err(|_| RegistryError::TooManyModules)?;
        Ok(self)
    }

    pub fn build(self) -> ModuleRegistry {
        ModuleRegistry {
            modules: self.modules,
        }
    }
}

/// The frozen module table.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Module, MAX_MODULES>,
}

impl ModuleRegistry {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id() == id)
    }

    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.iter_mut()
    }

    /// Route `cmd` to module `id`.
    pub fn dispatch(
        &mut self,
        id: ModuleId,
        cmd: &ModuleData,
        kernel: &mut Kernel,
        storage: &mut dyn StoragePort,
    ) -> Dispatch {
        let Some(module) = self.get_mut(id) else {
            return Dispatch::NotFound;
        };
        let mut ctx = ModuleCtx::new(id, kernel, storage);
        Dispatch::Handled(module.handle_command(cmd, &mut ctx))
    }
}
