//! The node runtime: kernel, session task, module tasks and shell.
//!
//! [`Node`] owns every task and every port.  It does no domain logic of its
//! own; it pulls messages out of the kernel and hands each one to the task
//! that owns the destination mailbox.
//!
//! ```text
//!  NETWORK_EVENTS ─▶ deliver_network_event ─┐
//!  timers ─────────▶ advance_to ────────────┤
//!  shell ──────────▶ run_shell ─────────────┤
//!                                           ▼
//!                                 Kernel mailboxes ──▶ step()
//!                                           │
//!                     ┌─────────────────────┴──────────────────┐
//!              TaskId::Session                        TaskId::Module(id, task)
//!            SessionManager::handle                  SensorModule::on_wake
//! ```

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};
use rand_core::RngCore;

use crate::app::commands::{JoinReason, Message, ModuleTask, TaskId, WakeReason};
use crate::app::ports::{DiagnosticsPort, EventSink, NetworkPort, StoragePort};
use crate::config::{Activation, NodeClass, NodeSettings, UplinkFailurePolicy, save_settings};
use crate::error::{KernelError, Result};
use crate::events::NetworkEvent;
use crate::fsm::StateId;
use crate::fsm::context::JoinState;
use crate::kernel::Kernel;
use crate::modules::{ModuleCtx, ModuleRegistry, SensorModule};
use crate::payload::{ModuleData, ModuleId};
use crate::pipeline::PipelineStats;
use crate::session::{SessionIo, SessionManager};
use crate::shell::{CommandHandler, CommandTable, NodeCommand, ShellStatus};

/// Upper bound on messages handled by one [`Node::run_until_idle`] call.
const MAX_STEPS_PER_RUN: usize = 1024;

pub struct Node<N, D, R, E, S>
where
    N: NetworkPort,
    D: DiagnosticsPort,
    R: RngCore,
    E: EventSink,
    S: StoragePort,
{
    kernel: Kernel,
    session: SessionManager,
    modules: ModuleRegistry,
    commands: CommandTable,
    network: N,
    diagnostics: D,
    rng: R,
    sink: E,
    storage: S,
}

impl<N, D, R, E, S> Node<N, D, R, E, S>
where
    N: NetworkPort,
    D: DiagnosticsPort,
    R: RngCore,
    E: EventSink,
    S: StoragePort,
{
    pub fn new(
        settings: NodeSettings,
        modules: ModuleRegistry,
        network: N,
        diagnostics: D,
        rng: R,
        sink: E,
        storage: S,
    ) -> Self {
        Self {
            kernel: Kernel::new(),
            session: SessionManager::new(settings),
            modules,
            commands: CommandTable::new(),
            network,
            diagnostics,
            rng,
            sink,
            storage,
        }
    }

    /// Spawn every task, register shell commands, initialise modules and
    /// queue the startup join.
    pub fn start(&mut self) -> Result<()> {
        self.kernel.spawn(TaskId::Session)?;
        for (name, help, cmd) in NodeCommand::ALL {
            self.commands
                .register_command(name, help, CommandHandler::Node(cmd))?;
        }
        self.session.start(&mut self.sink);

        for module in self.modules.iter_mut() {
            let id = module.id();
            for &task in module.tasks() {
                self.kernel.spawn(TaskId::Module(id, task))?;
            }
            self.commands
                .register_command(module.name(), module.help(), CommandHandler::Module(id))?;

            let mut ctx = ModuleCtx::new(id, &mut self.kernel, &mut self.storage);
            if module.init(&mut ctx) {
                info!("[node] module {} ({}) ready", module.name(), id);
            } else {
                warn!("[node] module {} ({}) failed to initialise", module.name(), id);
            }
        }

        self.kernel
            .post(TaskId::Session, Message::Join(JoinReason::Startup))?;
        Ok(())
    }

    // ── Inputs ────────────────────────────────────────────────

    /// Forward an event from the network stack to the session task.
    pub fn deliver_network_event(&mut self, event: NetworkEvent) -> core::result::Result<(), KernelError> {
        self.kernel.post(TaskId::Session, Message::Network(event))
    }

    pub fn request_join(&mut self) -> core::result::Result<(), KernelError> {
        self.kernel.post(TaskId::Session, Message::Join(JoinReason::Command))
    }

    pub fn enter_low_power(&mut self) -> core::result::Result<(), KernelError> {
        self.kernel.post(TaskId::Session, Message::EnterLowPower)
    }

    // ── Scheduling ────────────────────────────────────────────

    /// Handle one queued message.  Returns `false` when every mailbox is
    /// empty.
    pub fn step(&mut self) -> bool {
        let Some((task, msg)) = self.kernel.next_message() else {
            return false;
        };
        match task {
            TaskId::Session => {
                let mut io = SessionIo {
                    network: &mut self.network,
                    diagnostics: &mut self.diagnostics,
                    rng: &mut self.rng,
                    sink: &mut self.sink,
                    kernel: &mut self.kernel,
                    modules: &mut self.modules,
                    storage: &mut self.storage,
                };
                self.session.handle(msg, &mut io);
            }
            TaskId::Module(id, module_task) => self.wake_module(id, module_task, msg),
        }
        true
    }

    /// Handle messages until every mailbox is empty.
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        while handled < MAX_STEPS_PER_RUN && self.step() {
            handled += 1;
        }
        if handled == MAX_STEPS_PER_RUN {
            warn!("[node] message storm: {} handled without going idle", handled);
        }
        handled
    }

    /// Move time forward to `target`, delivering every deferred message on
    /// the way at its own deadline.
    pub fn advance_to(&mut self, target: Instant) -> usize {
        let mut handled = self.run_until_idle();
        while let Some(due) = self.kernel.next_deadline() {
            if due > target {
                break;
            }
            let delivered = self.kernel.advance_to(due);
            let ran = self.run_until_idle();
            handled += ran;
            // A due message stuck behind a full mailbox that did not drain.
            if delivered == 0 && ran == 0 {
                break;
            }
        }
        self.kernel.advance_to(target);
        handled + self.run_until_idle()
    }

    pub fn advance_by(&mut self, delta: Duration) -> usize {
        let target = self.kernel.now().checked_add(delta).unwrap_or(Instant::MAX);
        self.advance_to(target)
    }

    pub fn now(&self) -> Instant {
        self.kernel.now()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.kernel.next_deadline()
    }

    fn wake_module(&mut self, id: ModuleId, task: ModuleTask, msg: Message) {
        let Message::Wake(reason) = msg else {
            debug!("[node] module {} {:?}: ignoring {:?}", id, task, msg);
            return;
        };
        let Some(module) = self.modules.get_mut(id) else {
            warn!("[node] wake for unknown module {}", id);
            return;
        };
        let mut ctx = ModuleCtx::new(id, &mut self.kernel, &mut self.storage);
        module.on_wake(task, reason, &mut ctx);
    }

    // ── Shell ─────────────────────────────────────────────────

    /// Run a pre-tokenized command line.
    pub fn run_shell(&mut self, args: &[&str]) -> ShellStatus {
        let Some(&name) = args.first() else {
            return ShellStatus::Usage;
        };
        let Some(handler) = self.commands.find(name).map(|c| c.handler) else {
            warn!("[shell] unknown command '{}'", name);
            return ShellStatus::Failed;
        };

        let status = match handler {
            CommandHandler::Node(cmd) => self.run_node_command(cmd, &args[1..]),
            CommandHandler::Module(id) => match self.modules.get_mut(id) {
                Some(module) => {
                    let mut ctx = ModuleCtx::new(id, &mut self.kernel, &mut self.storage);
                    module.shell(args, &mut ctx)
                }
                None => ShellStatus::Failed,
            },
        };
        // Commands may have queued work (joins, polls); let it run.
        self.run_until_idle();
        status
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    fn run_node_command(&mut self, cmd: NodeCommand, args: &[&str]) -> ShellStatus {
        match cmd {
            NodeCommand::Join => match self.request_join() {
                Ok(()) => ShellStatus::Ok,
                Err(e) => {
                    warn!("[shell] join: {}", e);
                    ShellStatus::Failed
                }
            },
            NodeCommand::Cmd => self.shell_module_command(args),
            NodeCommand::ListModules => {
                for module in self.modules.iter() {
                    info!("[{}] {}", module.id(), module.name());
                }
                ShellStatus::Ok
            }
            NodeCommand::ListConfig => match self.settings_json() {
                Ok(json) => {
                    info!("{}", json);
                    ShellStatus::Ok
                }
                Err(e) => {
                    warn!("[shell] lscfg: {}", e);
                    ShellStatus::Failed
                }
            },
            NodeCommand::Set => match args {
                [key, value] => self.apply_setting(key, value),
                _ => ShellStatus::Usage,
            },
        }
    }

    /// `cmd <modid> <hex>`: run a command against a local module and log
    /// its reply.
    fn shell_module_command(&mut self, args: &[&str]) -> ShellStatus {
        let [id, hex_cmd] = args else {
            info!("usage: cmd <modid> <hex>");
            return ShellStatus::Usage;
        };
        let Ok(id) = id.parse::<u8>().map(ModuleId) else {
            return ShellStatus::Usage;
        };
        let cmd = match ModuleData::from_hex(hex_cmd) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("[shell] cmd: {}", e);
                return ShellStatus::Usage;
            }
        };

        let outcome = self
            .modules
            .dispatch(id, &cmd, &mut self.kernel, &mut self.storage);
        let (handled, reply, want_reply) = outcome.into_parts(id);
        let tag = if handled { "[ok]" } else { "[fail]" };
        if want_reply {
            info!("{} reply: {}", tag, reply.to_hex());
        } else {
            info!("{} no reply", tag);
        }
        if handled { ShellStatus::Ok } else { ShellStatus::Failed }
    }

    fn apply_setting(&mut self, key: &str, value: &str) -> ShellStatus {
        let mut s = *self.session.settings();
        let flag = match value {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        };

        let accepted = match key {
            "maxretr" => value.parse::<u8>().map(|v| s.set_max_retr(v)).is_ok(),
            "class" => match value {
                "A" | "a" => {
                    s.class = NodeClass::A;
                    true
                }
                "C" | "c" => {
                    s.class = NodeClass::C;
                    true
                }
                _ => false,
            },
            "adr" => flag.map(|f| s.adr = f).is_some(),
            "dr" => match value.parse::<u8>() {
                Ok(v) if v <= 6 => {
                    s.data_rate = v;
                    true
                }
                _ => false,
            },
            "otaa" => flag
                .map(|f| s.activation = if f { Activation::Otaa } else { Activation::Abp })
                .is_some(),
            "cnf" => flag.map(|f| s.confirmed = f).is_some(),
            "policy" => match value {
                "confirmed" => {
                    s.uplink_failure_policy = UplinkFailurePolicy::ConfirmedOnly;
                    true
                }
                "any" => {
                    s.uplink_failure_policy = UplinkFailurePolicy::AnySendError;
                    true
                }
                _ => false,
            },
            _ => {
                warn!("[shell] unknown setting '{}'", key);
                return ShellStatus::Usage;
            }
        };
        if !accepted {
            warn!("[shell] invalid value '{}' for {}", value, key);
            return ShellStatus::Usage;
        }

        if let Err(e) = save_settings(&mut self.storage, &s) {
            warn!("[shell] saving settings failed: {}", e);
            return ShellStatus::Failed;
        }
        self.session.update_settings(s);
        ShellStatus::Ok
    }

    /// Node settings rendered as JSON.
    pub fn settings_json(&self) -> core::result::Result<String, serde_json::Error> {
        serde_json::to_string(self.session.settings())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn session_state(&self) -> StateId {
        self.session.state()
    }

    pub fn join_state(&self) -> JoinState {
        self.session.join_state()
    }

    pub fn settings(&self) -> &NodeSettings {
        self.session.settings()
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.session.pipeline_stats()
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut E {
        &mut self.sink
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Pending wake-up of one module cycle.
    pub fn module_deadline(&self, id: ModuleId, task: ModuleTask) -> Option<Instant> {
        self.kernel.pending_deadline(TaskId::Module(id, task))
    }

    /// Wake a module cycle as if its timer fired.
    pub fn wake(&mut self, id: ModuleId, task: ModuleTask) -> core::result::Result<(), KernelError> {
        self.kernel
            .post(TaskId::Module(id, task), Message::Wake(WakeReason::Timer))
    }
}
