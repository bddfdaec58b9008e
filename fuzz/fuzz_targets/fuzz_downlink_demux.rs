//! Fuzz target: downlink routing
//!
//! Feeds arbitrary downlink payloads through the pipeline into a registry
//! holding the ultrasound module, and checks that every reply still fits
//! an uplink frame.
//!
//! cargo fuzz run fuzz_downlink_demux

#![no_main]

use libfuzzer_sys::fuzz_target;
use loranode::adapters::nvs::MemoryNvs;
use loranode::adapters::sim::{SimDiagnostics, SimRangeFinder};
use loranode::app::commands::{ModuleTask, TaskId};
use loranode::app::ports::PowerControl;
use loranode::kernel::Kernel;
use loranode::modules::ultrasound::{USOUND_MODULE_ID, UltrasoundModule};
use loranode::modules::{Module, RegistryBuilder};
use loranode::pipeline::{Demux, Pipeline};

struct NoRail;

impl PowerControl for NoRail {
    fn enable_and_settle(&mut self, _: u32) {}
    fn disable(&mut self) {}
}

static ECHOES: [i32; 2] = [450, -1];

fuzz_target!(|data: &[u8]| {
    let mut kernel = Kernel::new();
    let _ = kernel.spawn(TaskId::Session);
    for task in [ModuleTask::Regular, ModuleTask::Heartbeat] {
        let _ = kernel.spawn(TaskId::Module(USOUND_MODULE_ID, task));
    }
    let mut builder = RegistryBuilder::new();
    let module = UltrasoundModule::new(Box::new(SimRangeFinder::new(&ECHOES)), Box::new(NoRail));
    let _ = builder.register(Module::Ultrasound(module));
    let mut modules = builder.build();
    let mut nvs = MemoryNvs::new();
    let mut pipeline = Pipeline::new();

    if let Demux::Routed { reply: Some(reply), .. } =
        pipeline.demux(data, -100, &mut modules, &mut kernel, &mut nvs)
    {
        // Status replies are two bytes and always fit a frame.
        assert!(reply.len() <= 2);
        let frame = pipeline
            .encode(&reply, &mut SimDiagnostics::default())
            .expect("status reply must encode");
        assert_eq!(frame.len(), 16);
    }
});
