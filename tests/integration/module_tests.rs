//! Ultrasound module cycles through the full node: timers, downlink
//! sub-commands, threshold gating and the heartbeat.

use embassy_time::{Duration, Instant};

use loranode::adapters::nvs::MemoryNvs;
use loranode::app::commands::ModuleTask;
use loranode::app::ports::EchoParams;
use loranode::config::NodeSettings;
use loranode::events::{Downlink, NetworkEvent};
use loranode::modules::ultrasound::{USOUND_MODULE_ID, UltrasoundConfig};
use loranode::shell::ShellStatus;
use loranode::store::ConfigStore;

use crate::mock_hw::{
    MockNetwork, PowerCall, TestNode, UsoundRig, joined_node, started_node, with_usound,
};

fn downlink(node: &mut TestNode, bytes: &[u8]) {
    node.deliver_network_event(NetworkEvent::Downlink(Downlink::from_bytes(bytes, false, -90)))
        .unwrap();
    node.run_until_idle();
}

fn frames(node: &TestNode) -> Vec<Vec<u8>> {
    node.network().frames.iter().map(|f| f.bytes.clone()).collect()
}

#[test]
fn init_arms_report_and_heartbeat() {
    let rig = UsoundRig::default();
    let node = joined_node(with_usound(&rig));

    assert_eq!(
        node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular),
        Some(Instant::from_secs(15 * 60))
    );
    assert_eq!(
        node.module_deadline(USOUND_MODULE_ID, ModuleTask::Heartbeat),
        Some(Instant::from_secs(24 * 60 * 60))
    );
    assert_eq!(
        *rig.params.borrow(),
        Some(EchoParams {
            sensitivity: 50,
            min_distance_mm: 400,
            max_distance_mm: 6000,
        })
    );
    assert_eq!(node.commands().len(), 6);
}

#[test]
fn regular_cycle_reports_distance_and_rearms() {
    let rig = UsoundRig::default();
    rig.queue(&[1520]);
    let mut node = joined_node(with_usound(&rig));

    node.advance_by(Duration::from_secs(15 * 60));

    let sent = node.network().last_frame().expect("report uplinked").clone();
    assert_eq!(sent.bytes.len(), 16);
    assert_eq!(&sent.bytes[..5], &[0x1A, 0xF0, 0x05, 0x00, 0x00]);
    assert!(!sent.ack);
    assert_eq!(
        node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular),
        Some(Instant::from_secs(30 * 60))
    );
    assert_eq!(
        *rig.power.borrow(),
        vec![PowerCall::Disable, PowerCall::Enable(500), PowerCall::Disable]
    );
}

#[test]
fn threshold_mode_suppresses_far_and_invalid_readings() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));
    assert_eq!(node.run_shell(&["usound", "mode", "threshold"]), ShellStatus::Ok);

    rig.queue(&[450, 600, -1]);
    for _ in 0..3 {
        node.wake(USOUND_MODULE_ID, ModuleTask::Regular).unwrap();
        node.run_until_idle();
    }

    assert_eq!(rig.remaining(), 0);
    let sent = frames(&node);
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][..5], &[0x1A, 0xC2, 0x01, 0x00, 0x00]);
}

#[test]
fn zero_period_leaves_only_the_heartbeat() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));

    downlink(&mut node, &[0x1A, 0x00, 0x00]);
    let reply = node.network().last_frame().expect("status reply").clone();
    assert!(reply.ack);
    assert_eq!(&reply.bytes[..2], &[0x1A, 0x00]);
    assert_eq!(node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular), None);

    node.advance_by(Duration::from_secs(24 * 60 * 60));

    let sent = frames(&node);
    assert_eq!(sent.len(), 2);
    assert_eq!(&sent[1][..5], &[0x1A, 0x00, 0x00, 0x00, 0x00]);
    // No measurement ran.
    assert_eq!(*rig.power.borrow(), vec![PowerCall::Disable]);
    assert!(node
        .module_deadline(USOUND_MODULE_ID, ModuleTask::Heartbeat)
        .is_some());
}

#[test]
fn set_period_is_persisted_and_rearms() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));

    downlink(&mut node, &[0x1A, 0x00, 0x05]);

    assert_eq!(
        node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular),
        Some(node.now() + Duration::from_secs(5 * 60))
    );
    let stored: UltrasoundConfig = ConfigStore::new(node.storage_mut())
        .load_config(USOUND_MODULE_ID)
        .unwrap();
    assert_eq!(stored.publish_period_min, 5);
}

#[test]
fn poll_reports_immediately_as_ack() {
    let rig = UsoundRig::default();
    rig.queue(&[700]);
    let mut node = joined_node(with_usound(&rig));

    downlink(&mut node, &[0x1A, 0x01]);

    let sent = node.network().frames.clone();
    assert_eq!(sent.len(), 1, "poll has no status reply, only the report");
    assert!(sent[0].ack);
    assert_eq!(&sent[0].bytes[..5], &[0x1A, 0xBC, 0x02, 0x00, 0x00]);
}

#[test]
fn shell_send_polls_the_sensor() {
    let rig = UsoundRig::default();
    rig.queue(&[700]);
    let mut node = joined_node(with_usound(&rig));

    assert_eq!(node.run_shell(&["usound", "send"]), ShellStatus::Ok);

    assert_eq!(node.network().frames.len(), 1);
    assert!(node.network().frames[0].ack);
}

#[test]
fn malformed_and_unknown_sub_commands_fail() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));

    downlink(&mut node, &[0x1A, 0x07]);
    downlink(&mut node, &[0x1A, 0x00]);

    let sent = frames(&node);
    assert_eq!(sent.len(), 2);
    for frame in sent {
        assert_eq!(&frame[..2], &[0x1A, 0xFF]);
    }
}

#[test]
fn failed_init_leaves_module_idle_until_reinit() {
    let rig = UsoundRig::default();
    *rig.init_fails.borrow_mut() = true;
    let mut node = joined_node(with_usound(&rig));

    assert_eq!(node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular), None);
    assert_eq!(node.module_deadline(USOUND_MODULE_ID, ModuleTask::Heartbeat), None);

    downlink(&mut node, &[0x1A, 0x02]);
    assert_eq!(&node.network().last_frame().unwrap().bytes[..2], &[0x1A, 0xFF]);
    assert_eq!(node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular), None);

    *rig.init_fails.borrow_mut() = false;
    downlink(&mut node, &[0x1A, 0x02]);
    assert_eq!(&node.network().last_frame().unwrap().bytes[..2], &[0x1A, 0x00]);

    // The late init starts both cycles from now.
    let now = node.now();
    assert_eq!(
        node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular),
        Some(now + Duration::from_secs(15 * 60))
    );
    assert_eq!(
        node.module_deadline(USOUND_MODULE_ID, ModuleTask::Heartbeat),
        Some(now + Duration::from_secs(24 * 60 * 60))
    );
}

#[test]
fn reinit_of_a_ready_sensor_keeps_the_schedule() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));
    node.advance_by(Duration::from_secs(60));

    downlink(&mut node, &[0x1A, 0x02]);
    assert_eq!(&node.network().last_frame().unwrap().bytes[..2], &[0x1A, 0x00]);
    assert_eq!(
        node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular),
        Some(Instant::from_secs(15 * 60))
    );
}

#[test]
fn stored_config_survives_restart() {
    let mut nvs = MemoryNvs::new();
    let config = UltrasoundConfig {
        publish_period_min: 0,
        sensitivity: 80,
        ..UltrasoundConfig::default()
    };
    ConfigStore::new(&mut nvs)
        .save_config(USOUND_MODULE_ID, &config)
        .unwrap();

    let rig = UsoundRig::default();
    let node = started_node(
        NodeSettings::default(),
        MockNetwork::accepting(),
        with_usound(&rig),
        nvs,
    );

    assert_eq!(node.module_deadline(USOUND_MODULE_ID, ModuleTask::Regular), None);
    assert!(node
        .module_deadline(USOUND_MODULE_ID, ModuleTask::Heartbeat)
        .is_some());
    assert_eq!(rig.params.borrow().map(|p| p.sensitivity), Some(80));
}

#[test]
fn echo_settings_reach_the_transducer() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));

    assert_eq!(node.run_shell(&["usound", "sens", "80"]), ShellStatus::Ok);
    assert_eq!(node.run_shell(&["usound", "max", "4000"]), ShellStatus::Ok);
    assert_eq!(node.run_shell(&["usound", "min", "abc"]), ShellStatus::Usage);

    let params = rig.params.borrow().expect("configured");
    assert_eq!(params.sensitivity, 80);
    assert_eq!(params.max_distance_mm, 4000);
    assert_eq!(params.min_distance_mm, 400);
}
