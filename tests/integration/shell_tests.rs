//! Operator shell: built-in node commands and module delegation.

use loranode::config::{NodeClass, load_settings};
use loranode::modules::ultrasound::{USOUND_MODULE_ID, UltrasoundConfig};
use loranode::shell::ShellStatus;
use loranode::store::ConfigStore;

use crate::mock_hw::{UsoundRig, joined_node, no_modules, with_usound};

#[test]
fn unknown_and_empty_command_lines() {
    let mut node = joined_node(no_modules());
    assert_eq!(node.run_shell(&["reboot"]), ShellStatus::Failed);
    assert_eq!(node.run_shell(&[]), ShellStatus::Usage);
}

#[test]
fn listing_commands_succeed() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));
    assert_eq!(node.run_shell(&["lsmod"]), ShellStatus::Ok);
    assert_eq!(node.run_shell(&["lscfg"]), ShellStatus::Ok);
    assert_eq!(node.run_shell(&["usound"]), ShellStatus::Ok);
}

#[test]
fn settings_render_as_json() {
    let node = joined_node(no_modules());
    let json = node.settings_json().unwrap();
    assert!(json.contains("\"max_retr\":2"), "{}", json);
    assert!(json.contains("\"class\":\"A\""), "{}", json);
}

#[test]
fn set_changes_and_persists_settings() {
    let mut node = joined_node(no_modules());

    assert_eq!(node.run_shell(&["set", "maxretr", "4"]), ShellStatus::Ok);
    assert_eq!(node.run_shell(&["set", "class", "C"]), ShellStatus::Ok);
    assert_eq!(node.settings().max_retr, 4);
    assert_eq!(node.join_state().class, NodeClass::C);

    let (stored, found) = load_settings(node.storage());
    assert!(found);
    assert_eq!(stored.max_retr, 4);
    assert_eq!(stored.class, NodeClass::C);
}

#[test]
fn set_clamps_max_retr() {
    let mut node = joined_node(no_modules());
    assert_eq!(node.run_shell(&["set", "maxretr", "9"]), ShellStatus::Ok);
    assert_eq!(node.settings().max_retr, 5);
}

#[test]
fn set_rejects_bad_input() {
    let mut node = joined_node(no_modules());
    assert_eq!(node.run_shell(&["set", "class", "B"]), ShellStatus::Usage);
    assert_eq!(node.run_shell(&["set", "dr", "7"]), ShellStatus::Usage);
    assert_eq!(node.run_shell(&["set", "volume", "1"]), ShellStatus::Usage);
    assert_eq!(node.run_shell(&["set", "adr"]), ShellStatus::Usage);
    assert_eq!(node.settings().class, NodeClass::A);
}

#[test]
fn join_command_rejoins() {
    let mut node = joined_node(no_modules());
    assert_eq!(node.run_shell(&["join"]), ShellStatus::Ok);
    assert_eq!(node.network().attaches.len(), 2);
}

#[test]
fn cmd_runs_module_command_locally() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));

    assert_eq!(node.run_shell(&["cmd", "26", "0005"]), ShellStatus::Ok);

    let stored: UltrasoundConfig = ConfigStore::new(node.storage_mut())
        .load_config(USOUND_MODULE_ID)
        .unwrap();
    assert_eq!(stored.publish_period_min, 5);
    // Shell replies are printed, not uplinked.
    assert!(node.network().frames.is_empty());
}

#[test]
fn cmd_argument_errors() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));

    assert_eq!(node.run_shell(&["cmd", "99", "01"]), ShellStatus::Failed);
    assert_eq!(node.run_shell(&["cmd", "26", "0"]), ShellStatus::Usage);
    assert_eq!(node.run_shell(&["cmd", "26", "zz"]), ShellStatus::Usage);
    assert_eq!(node.run_shell(&["cmd", "x", "01"]), ShellStatus::Usage);
    assert_eq!(node.run_shell(&["cmd"]), ShellStatus::Usage);
    // Unknown sub-command is handled by the module and fails.
    assert_eq!(node.run_shell(&["cmd", "26", "07"]), ShellStatus::Failed);
}

#[test]
fn module_shell_updates_config() {
    let rig = UsoundRig::default();
    let mut node = joined_node(with_usound(&rig));

    assert_eq!(node.run_shell(&["usound", "threshold", "800"]), ShellStatus::Ok);
    assert_eq!(node.run_shell(&["usound", "mode", "loud"]), ShellStatus::Usage);
    assert_eq!(node.run_shell(&["usound", "reset"]), ShellStatus::Ok);

    let stored: UltrasoundConfig = ConfigStore::new(node.storage_mut())
        .load_config(USOUND_MODULE_ID)
        .unwrap();
    assert_eq!(stored, UltrasoundConfig::default());
}
