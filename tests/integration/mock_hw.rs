//! Mock adapters for integration tests.
//!
//! Every port records what the node asked of it so tests can assert on the
//! full history (attach attempts, uplink frames, emitted events) without a
//! radio or a transducer.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use loranode::adapters::nvs::MemoryNvs;
use loranode::app::events::NodeEvent;
use loranode::app::ports::{
    AttachStatus, DiagnosticsPort, EchoParams, EventSink, NetworkPort, PowerControl, RangeFinder,
    SendStatus,
};
use loranode::config::{Activation, NodeSettings};
use loranode::modules::ultrasound::UltrasoundModule;
use loranode::modules::{Module, ModuleRegistry, RegistryBuilder};
use loranode::node::Node;

// ── Network ───────────────────────────────────────────────────

/// A frame handed to `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub bytes: Vec<u8>,
    pub ack: bool,
}

/// Scripted MAC: queued results are used first, then the defaults.
pub struct MockNetwork {
    pub attach_script: VecDeque<AttachStatus>,
    pub attach_default: AttachStatus,
    pub send_script: VecDeque<SendStatus>,
    pub send_default: SendStatus,
    pub attaches: Vec<Activation>,
    pub frames: Vec<SentFrame>,
}

#[allow(dead_code)]
impl MockNetwork {
    /// Accepts every join and every uplink.
    pub fn accepting() -> Self {
        Self {
            attach_script: VecDeque::new(),
            attach_default: AttachStatus::Success,
            send_script: VecDeque::new(),
            send_default: SendStatus::Scheduled,
            attaches: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Every join attempt times out.
    pub fn unreachable() -> Self {
        Self {
            attach_default: AttachStatus::NotJoined,
            ..Self::accepting()
        }
    }

    pub fn last_frame(&self) -> Option<&SentFrame> {
        self.frames.last()
    }
}

impl NetworkPort for MockNetwork {
    fn attach(&mut self, mode: Activation) -> AttachStatus {
        self.attaches.push(mode);
        self.attach_script.pop_front().unwrap_or(self.attach_default)
    }

    fn send(&mut self, payload: &[u8], ack: bool) -> SendStatus {
        let status = self.send_script.pop_front().unwrap_or(self.send_default);
        if status == SendStatus::Scheduled {
            self.frames.push(SentFrame {
                bytes: payload.to_vec(),
                ack,
            });
        }
        status
    }
}

// ── Diagnostics ───────────────────────────────────────────────

pub struct MockDiagnostics {
    pub temperature_c: Option<i8>,
    pub supply_mv: Option<u16>,
}

impl Default for MockDiagnostics {
    fn default() -> Self {
        Self {
            temperature_c: Some(-5),
            supply_mv: Some(3300),
        }
    }
}

impl DiagnosticsPort for MockDiagnostics {
    fn mcu_temperature_c(&mut self) -> Option<i8> {
        self.temperature_c
    }

    fn supply_voltage_mv(&mut self) -> Option<u16> {
        self.supply_mv
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&NodeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &NodeEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}

// ── RNG ───────────────────────────────────────────────────────

/// Always draws zero, so every backoff lands on its lower bound.
pub struct ZeroRng;

impl rand_core::RngCore for ZeroRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        dest.fill(0);
        Ok(())
    }
}

// ── Ultrasound hardware ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCall {
    Enable(u32),
    Disable,
}

/// Test-side handles into the boxed range finder and power rail.
#[derive(Clone, Default)]
pub struct UsoundRig {
    pub readings: Rc<RefCell<VecDeque<i32>>>,
    pub init_fails: Rc<RefCell<bool>>,
    pub params: Rc<RefCell<Option<EchoParams>>>,
    pub power: Rc<RefCell<Vec<PowerCall>>>,
}

#[allow(dead_code)]
impl UsoundRig {
    pub fn queue(&self, readings: &[i32]) {
        self.readings.borrow_mut().extend(readings.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.readings.borrow().len()
    }
}

struct MockRangeFinder(UsoundRig);

impl RangeFinder for MockRangeFinder {
    fn init(&mut self, params: &EchoParams) -> bool {
        *self.0.params.borrow_mut() = Some(*params);
        !*self.0.init_fails.borrow()
    }

    fn configure(&mut self, params: &EchoParams) {
        *self.0.params.borrow_mut() = Some(*params);
    }

    fn measure(&mut self) -> i32 {
        self.0.readings.borrow_mut().pop_front().unwrap_or(-1)
    }
}

struct MockPower(UsoundRig);

impl PowerControl for MockPower {
    fn enable_and_settle(&mut self, settle_ms: u32) {
        self.0.power.borrow_mut().push(PowerCall::Enable(settle_ms));
    }

    fn disable(&mut self) {
        self.0.power.borrow_mut().push(PowerCall::Disable);
    }
}

pub fn usound_module(rig: &UsoundRig) -> Module {
    Module::Ultrasound(UltrasoundModule::new(
        Box::new(MockRangeFinder(rig.clone())),
        Box::new(MockPower(rig.clone())),
    ))
}

// ── Node assembly ─────────────────────────────────────────────

pub type TestNode = Node<MockNetwork, MockDiagnostics, ZeroRng, RecordingSink, MemoryNvs>;

pub fn no_modules() -> ModuleRegistry {
    RegistryBuilder::new().build()
}

#[allow(dead_code)]
pub fn with_usound(rig: &UsoundRig) -> ModuleRegistry {
    let mut builder = RegistryBuilder::new();
    builder.register(usound_module(rig)).unwrap();
    builder.build()
}

/// Build and start a node.  The startup join is queued but not yet run.
pub fn started_node(
    settings: NodeSettings,
    network: MockNetwork,
    modules: ModuleRegistry,
    nvs: MemoryNvs,
) -> TestNode {
    let mut node = Node::new(
        settings,
        modules,
        network,
        MockDiagnostics::default(),
        ZeroRng,
        RecordingSink::default(),
        nvs,
    );
    node.start().unwrap();
    node
}

/// A started node that has completed its startup join.
#[allow(dead_code)]
pub fn joined_node(modules: ModuleRegistry) -> TestNode {
    let mut node = started_node(
        NodeSettings::default(),
        MockNetwork::accepting(),
        modules,
        MemoryNvs::new(),
    );
    node.run_until_idle();
    node
}
