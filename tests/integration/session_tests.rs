//! Session state machine driven end to end through the node: joins,
//! retries with backoff, class-A give-up, uplink-loss rejoin and the
//! downlink path.

use embassy_time::Duration;

use loranode::adapters::nvs::MemoryNvs;
use loranode::app::events::NodeEvent;
use loranode::app::ports::{AttachStatus, SendStatus};
use loranode::config::{NodeClass, NodeSettings, UplinkFailurePolicy};
use loranode::error::NetworkError;
use loranode::events::{Downlink, NetworkEvent};
use loranode::fsm::StateId;
use loranode::payload::{ModuleId, NOT_FOUND_CODE};

use crate::mock_hw::{MockNetwork, TestNode, joined_node, no_modules, started_node};

fn unreachable_node(class: NodeClass) -> TestNode {
    let settings = NodeSettings {
        class,
        ..NodeSettings::default()
    };
    started_node(settings, MockNetwork::unreachable(), no_modules(), MemoryNvs::new())
}

fn deliver(node: &mut TestNode, event: NetworkEvent) {
    node.deliver_network_event(event).unwrap();
    node.run_until_idle();
}

// ── Join ──────────────────────────────────────────────────────

#[test]
fn startup_join_succeeds_on_first_attempt() {
    let node = joined_node(no_modules());

    assert_eq!(node.session_state(), StateId::Joined);
    assert_eq!(node.network().attaches.len(), 1);
    assert!(node.sink().contains(&NodeEvent::JoinAttempt { attempt: 1 }));
    assert!(node.sink().contains(&NodeEvent::Joined));
    assert_eq!(node.join_state().retries, 0);
}

#[test]
fn failed_join_schedules_retry_in_first_window() {
    let mut node = unreachable_node(NodeClass::A);
    node.run_until_idle();

    assert_eq!(node.session_state(), StateId::WaitingRetry);
    assert_eq!(node.join_state().retries, 1);
    assert!(node.sink().contains(&NodeEvent::JoinRetryScheduled {
        attempt: 1,
        delay_ms: 10_000,
        cause: NetworkError::NotJoined,
    }));
    let due = node.next_deadline().expect("retry must be pending");
    assert_eq!(due - node.now(), Duration::from_millis(10_000));
}

#[test]
fn class_a_gives_up_after_max_retr_plus_one_attempts() {
    let mut node = unreachable_node(NodeClass::A);
    node.run_until_idle();

    // Second window: [40 s, 60 s), lower bound with a zero draw.
    node.advance_by(Duration::from_secs(10));
    assert_eq!(node.join_state().retries, 2);
    assert!(node.sink().contains(&NodeEvent::JoinRetryScheduled {
        attempt: 2,
        delay_ms: 40_000,
        cause: NetworkError::NotJoined,
    }));

    node.advance_by(Duration::from_secs(40));
    assert_eq!(node.session_state(), StateId::Disabled);
    assert_eq!(node.network().attaches.len(), 3);
    assert!(node.sink().contains(&NodeEvent::JoinAbandoned));
    assert_eq!(node.join_state().retries, 0);

    // Nothing else is scheduled once disabled.
    assert_eq!(node.next_deadline(), None);
    node.advance_by(Duration::from_secs(3600));
    assert_eq!(node.network().attaches.len(), 3);
}

#[test]
fn class_c_never_gives_up() {
    let mut node = unreachable_node(NodeClass::C);
    node.run_until_idle();
    node.advance_by(Duration::from_secs(3600));

    assert_eq!(node.session_state(), StateId::WaitingRetry);
    assert!(node.network().attaches.len() > 3);
    assert!(!node.sink().contains(&NodeEvent::JoinAbandoned));
    assert!(node.next_deadline().is_some());
}

#[test]
fn join_command_leaves_disabled() {
    let mut node = unreachable_node(NodeClass::A);
    node.run_until_idle();
    node.advance_by(Duration::from_secs(3600));
    assert_eq!(node.session_state(), StateId::Disabled);

    node.network_mut().attach_default = AttachStatus::Success;
    node.request_join().unwrap();
    node.run_until_idle();

    assert_eq!(node.session_state(), StateId::Joined);
    assert_eq!(node.network().attaches.len(), 4);
}

#[test]
fn explicit_join_supersedes_pending_retry() {
    let mut node = unreachable_node(NodeClass::C);
    node.run_until_idle();
    assert!(node.next_deadline().is_some());

    node.network_mut().attach_default = AttachStatus::Success;
    node.request_join().unwrap();
    node.run_until_idle();

    assert_eq!(node.session_state(), StateId::Joined);
    assert_eq!(node.next_deadline(), None);
}

#[test]
fn unknown_attach_status_leaves_state_alone() {
    let mut network = MockNetwork::accepting();
    network.attach_script.push_back(AttachStatus::Unknown(42));
    let mut node = started_node(NodeSettings::default(), network, no_modules(), MemoryNvs::new());
    node.run_until_idle();

    assert_eq!(node.session_state(), StateId::Joining);
    assert_eq!(node.next_deadline(), None);
}

#[test]
fn low_power_resets_counters_and_forces_class_a() {
    let mut node = unreachable_node(NodeClass::C);
    node.run_until_idle();
    assert_eq!(node.join_state().retries, 1);

    node.enter_low_power().unwrap();
    node.run_until_idle();

    let js = node.join_state();
    assert_eq!(js.class, NodeClass::A);
    assert_eq!(js.retries, 0);
    assert_eq!(js.uplinks_failed, 0);
    assert_eq!(node.session_state(), StateId::WaitingRetry);
    assert_eq!(node.settings().class, NodeClass::A);
    let json = node.settings_json().unwrap();
    assert!(json.contains("\"class\":\"A\""), "{}", json);
}

// ── Uplink loss ───────────────────────────────────────────────

#[test]
fn unacknowledged_uplinks_trigger_rejoin() {
    let mut node = joined_node(no_modules());

    deliver(&mut node, NetworkEvent::TxConfirmedFailed);
    deliver(&mut node, NetworkEvent::TxConfirmedFailed);
    assert_eq!(node.join_state().uplinks_failed, 2);
    assert_eq!(node.network().attaches.len(), 1);

    deliver(&mut node, NetworkEvent::TxConfirmedFailed);
    assert!(node
        .sink()
        .contains(&NodeEvent::RejoinTriggered { uplinks_failed: 3 }));
    assert!(node.sink().contains(&NodeEvent::StateChanged {
        from: StateId::Joined,
        to: StateId::Joining,
    }));
    assert_eq!(node.network().attaches.len(), 2);
    assert_eq!(node.session_state(), StateId::Joined);
    assert_eq!(node.join_state().uplinks_failed, 0);
}

#[test]
fn delivered_uplink_does_not_clear_loss_count() {
    let mut node = joined_node(no_modules());

    deliver(&mut node, NetworkEvent::TxConfirmedFailed);
    deliver(&mut node, NetworkEvent::TxConfirmedFailed);
    deliver(&mut node, NetworkEvent::TxDone);
    assert!(node.sink().contains(&NodeEvent::UplinkDelivered));
    assert_eq!(node.join_state().uplinks_failed, 2);

    deliver(&mut node, NetworkEvent::TxConfirmedFailed);
    assert_eq!(node.network().attaches.len(), 2);
}

#[test]
fn busy_sends_count_only_under_any_error_policy() {
    for (policy, expected_attaches) in [
        (UplinkFailurePolicy::ConfirmedOnly, 1),
        (UplinkFailurePolicy::AnySendError, 2),
    ] {
        let settings = NodeSettings {
            uplink_failure_policy: policy,
            ..NodeSettings::default()
        };
        let mut network = MockNetwork::accepting();
        network.send_default = SendStatus::Busy;
        let mut node = started_node(settings, network, no_modules(), MemoryNvs::new());
        node.run_until_idle();

        // Each command for an unknown module produces a reply uplink.
        for _ in 0..3 {
            deliver(&mut node, NetworkEvent::Downlink(Downlink::from_bytes(&[0x42, 0x01], false, -80)));
        }
        assert_eq!(
            node.sink()
                .count(|e| *e == NodeEvent::UplinkRejected(SendStatus::Busy)),
            3
        );
        assert_eq!(node.network().attaches.len(), expected_attaches, "{:?}", policy);
    }
}

#[test]
fn send_while_not_joined_requests_join() {
    let mut node = joined_node(no_modules());
    node.network_mut().send_script.push_back(SendStatus::NotJoined);

    deliver(&mut node, NetworkEvent::Downlink(Downlink::from_bytes(&[0x42, 0x01], false, -80)));

    assert!(node
        .sink()
        .contains(&NodeEvent::UplinkRejected(SendStatus::NotJoined)));
    assert_eq!(node.network().attaches.len(), 2);
    assert_eq!(node.session_state(), StateId::Joined);
}

// ── Downlink ──────────────────────────────────────────────────

#[test]
fn command_for_unknown_module_gets_not_found_reply() {
    let mut node = joined_node(no_modules());

    deliver(&mut node, NetworkEvent::Downlink(Downlink::from_bytes(&[0x42, 0x01, 0x02], false, -80)));

    assert!(node.sink().contains(&NodeEvent::DownlinkRouted {
        module: ModuleId(0x42),
        found: false,
    }));
    let frame = node.network().last_frame().expect("reply uplinked");
    assert!(frame.ack);
    assert_eq!(frame.bytes.len(), 16);
    assert_eq!(&frame.bytes[..2], &[NOT_FOUND_CODE, 0x42]);
    assert!(frame.bytes[2..14].iter().all(|&b| b == 0));
    // -5 °C sign-magnitude, 3300 mV in 50 mV steps.
    assert_eq!(&frame.bytes[14..], &[0x85, 66]);
    assert_eq!(node.pipeline_stats().not_found, 1);
}

#[test]
fn bare_ack_is_reported_not_routed() {
    let mut node = joined_node(no_modules());

    deliver(&mut node, NetworkEvent::Downlink(Downlink::from_bytes(&[], true, -70)));

    assert!(node.sink().contains(&NodeEvent::BareAck { rssi: -70 }));
    assert!(node.network().frames.is_empty());
    assert_eq!(node.pipeline_stats().routed, 0);
}

#[test]
fn one_byte_downlink_is_an_ack() {
    let mut node = joined_node(no_modules());

    deliver(&mut node, NetworkEvent::Downlink(Downlink::from_bytes(&[0x42], false, -70)));

    assert!(node.network().frames.is_empty());
    assert_eq!(
        node.sink()
            .count(|e| matches!(e, NodeEvent::DownlinkRouted { .. })),
        0
    );
}

#[test]
fn unknown_network_events_are_ignored() {
    let mut node = joined_node(no_modules());
    let before = node.sink().events.len();

    deliver(&mut node, NetworkEvent::Other(77));
    deliver(&mut node, NetworkEvent::JoinNotification);

    assert_eq!(node.sink().events.len(), before);
    assert_eq!(node.session_state(), StateId::Joined);
}
