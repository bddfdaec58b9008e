//! LoRaNode — host simulation entry point.
//!
//! Runs the full node core against simulated adapters so the session state
//! machine, module cycles and shell can be exercised on a workstation.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedMac   SimDiagnostics   MemoryNvs   LogEventSink      │
//! │  (NetworkPort)  (Diagnostics)    (Storage)   (EventSink)       │
//! │  SimRangeFinder + PowerRail<SimPin, StdDelay> (ultrasound)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Node: Kernel · SessionManager (FSM) · ModuleRegistry  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  LocalExecutor: network pump · timer loop · shell loop         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};
use rand_core::OsRng;

use loranode::adapters::log_sink::LogEventSink;
use loranode::adapters::nvs::MemoryNvs;
use loranode::adapters::sim::{SimDiagnostics, SimPin, SimRangeFinder, SimulatedMac, StdDelay};
use loranode::adapters::time::MonotonicClock;
use loranode::config::{load_settings, save_settings};
use loranode::drivers::power_rail::PowerRail;
use loranode::events::NETWORK_EVENTS;
use loranode::modules::ultrasound::UltrasoundModule;
use loranode::modules::{Module, RegistryBuilder};
use loranode::node::Node;

type SimNode = Node<SimulatedMac, SimDiagnostics, OsRng, LogEventSink, MemoryNvs>;
type SharedNode = Rc<RefCell<SimNode>>;

/// Longest the timer loop sleeps without re-checking deadlines.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Attaches the simulated MAC rejects before accepting.
const SIM_JOIN_FAILURES: u8 = 2;

/// Echo distances the simulated transducer cycles through, in mm.
static SIM_ECHOES: [i32; 6] = [1520, 1498, 455, 430, -1, 2210];

const SHELL_LINE_LEN: usize = 96;
const MAX_SHELL_ARGS: usize = 8;

/// Lines typed on stdin, handed from the reader thread to the executor.
static SHELL_LINES: Channel<CriticalSectionRawMutex, heapless::String<SHELL_LINE_LEN>, 4> =
    Channel::new();

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  LoRaNode sim v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Settings (or defaults) ─────────────────────────────
    let mut nvs = MemoryNvs::new();
    let (settings, stored) = load_settings(&nvs);
    if !stored {
        info!("No stored settings, writing defaults");
        if let Err(e) = save_settings(&mut nvs, &settings) {
            warn!("Saving default settings failed: {}", e);
        }
    }

    // ── 3. Modules ────────────────────────────────────────────
    let rail = PowerRail::active_low(SimPin::default(), StdDelay);
    let usound = UltrasoundModule::new(
        Box::new(SimRangeFinder::new(&SIM_ECHOES)),
        Box::new(rail),
    );
    let mut registry = RegistryBuilder::new();
    registry.register(Module::Ultrasound(usound))?;

    // ── 4. Node ───────────────────────────────────────────────
    let mut node = Node::new(
        settings,
        registry.build(),
        SimulatedMac::new(SIM_JOIN_FAILURES),
        SimDiagnostics::default(),
        OsRng,
        LogEventSink::new(),
        nvs,
    );
    node.start()?;
    let node: SharedNode = Rc::new(RefCell::new(node));

    // ── 5. Shell reader ───────────────────────────────────────
    let _stdin = std::thread::Builder::new()
        .name("shell-stdin".into())
        .spawn(read_stdin)?;

    // ── 6. Run loop ───────────────────────────────────────────
    let clock = Rc::new(MonotonicClock::new());
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    executor.spawn(network_pump(node.clone())).detach();
    executor.spawn(timer_loop(node.clone(), clock)).detach();
    executor.spawn(shell_loop(node)).detach();

    info!("Node running; type 'lsmod', 'lscfg', 'join', 'usound get', ...");
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
    Ok(())
}

/// Forward MAC completions into the session task.
async fn network_pump(node: SharedNode) {
    loop {
        let event = NETWORK_EVENTS.receive().await;
        let mut node = node.borrow_mut();
        if let Err(e) = node.deliver_network_event(event) {
            warn!("Network event dropped: {}", e);
        }
        node.run_until_idle();
    }
}

/// Track wall time and fire deferred messages as they fall due.
async fn timer_loop(node: SharedNode, clock: Rc<MonotonicClock>) {
    loop {
        let next = {
            let mut node = node.borrow_mut();
            node.advance_to(clock.now());
            node.next_deadline()
        };
        let wait = next.map_or(IDLE_POLL, |due| clock.until(due).min(IDLE_POLL));
        async_io_mini::Timer::after(wait).await;
    }
}

/// Tokenize shell lines and run them.
async fn shell_loop(node: SharedNode) {
    loop {
        let line = SHELL_LINES.receive().await;
        let args: heapless::Vec<&str, MAX_SHELL_ARGS> =
            line.split_whitespace().take(MAX_SHELL_ARGS).collect();
        if args.is_empty() {
            continue;
        }
        let status = node.borrow_mut().run_shell(&args);
        info!("[shell] {:?}", status);
    }
}

/// Blocking stdin reader; runs on its own thread.
fn read_stdin() {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let mut buf = heapless::String::new();
        if buf.push_str(line.trim()).is_err() {
            warn!("[shell] line longer than {} bytes ignored", SHELL_LINE_LEN);
            continue;
        }
        futures_lite::future::block_on(SHELL_LINES.send(buf));
    }
}
