//! Persistence: node settings and fixed-size module records.

use loranode::adapters::nvs::MemoryNvs;
use loranode::app::ports::StoragePort;
use loranode::config::{NodeClass, NodeSettings, load_settings, save_settings};
use loranode::error::StoreError;
use loranode::modules::ultrasound::{USOUND_MODULE_ID, UltrasoundConfig};
use loranode::payload::ModuleId;
use loranode::store::{ConfigStore, ERASED_MARKER, RECORD_SIZE, VALID_MARKER};

#[test]
fn settings_round_trip() {
    let mut nvs = MemoryNvs::new();
    let settings = NodeSettings {
        class: NodeClass::C,
        max_retr: 3,
        ..NodeSettings::default()
    };
    save_settings(&mut nvs, &settings).unwrap();

    let (loaded, found) = load_settings(&nvs);
    assert!(found);
    assert_eq!(loaded, settings);
}

#[test]
fn missing_settings_fall_back_to_defaults() {
    let nvs = MemoryNvs::new();
    let (loaded, found) = load_settings(&nvs);
    assert!(!found);
    assert_eq!(loaded, NodeSettings::default());
}

#[test]
fn out_of_range_settings_are_not_saved() {
    let mut nvs = MemoryNvs::new();
    let settings = NodeSettings {
        data_rate: 9,
        ..NodeSettings::default()
    };
    assert!(save_settings(&mut nvs, &settings).is_err());
    assert!(nvs.is_empty());
}

#[test]
fn read_only_backend_reports_failure() {
    let mut nvs = MemoryNvs::read_only();
    assert_eq!(
        save_settings(&mut nvs, &NodeSettings::default()),
        Err(StoreError::Backend)
    );
}

#[test]
fn module_record_marks_validity() {
    let mut nvs = MemoryNvs::new();
    let mut store = ConfigStore::new(&mut nvs);

    let mut record = [0u8; RECORD_SIZE];
    record[1..4].copy_from_slice(&[7, 8, 9]);
    store.save(ModuleId(3), &mut record).unwrap();
    assert_eq!(record[0], VALID_MARKER);

    let mut back = [0u8; RECORD_SIZE];
    assert!(store.load(ModuleId(3), &mut back));
    assert_eq!(back, record);
    assert!(!store.load(ModuleId(4), &mut back));
}

#[test]
fn erased_record_loads_defaults() {
    let mut nvs = MemoryNvs::new();
    let mut erased = [0u8; RECORD_SIZE];
    erased[0] = ERASED_MARKER;
    nvs.write("modcfg", "m26", &erased).unwrap();

    let mut store = ConfigStore::new(&mut nvs);
    assert_eq!(
        store.load_config::<UltrasoundConfig>(USOUND_MODULE_ID),
        Err(StoreError::Absent)
    );
    let config: UltrasoundConfig = store.load_or_default(USOUND_MODULE_ID);
    assert_eq!(config, UltrasoundConfig::default());
    // Defaults were written back.
    assert!(store.load_config::<UltrasoundConfig>(USOUND_MODULE_ID).is_ok());
}

#[test]
fn module_config_round_trip() {
    let mut nvs = MemoryNvs::new();
    let mut store = ConfigStore::new(&mut nvs);
    let config = UltrasoundConfig {
        publish_period_min: 60,
        threshold_mm: 1200,
        ..UltrasoundConfig::default()
    };
    store.save_config(USOUND_MODULE_ID, &config).unwrap();
    assert_eq!(store.load_config::<UltrasoundConfig>(USOUND_MODULE_ID), Ok(config));
}
