//! Fuzz target: module configuration records
//!
//! Writes arbitrary bytes as a stored record and checks that loading never
//! panics and that a rejected record is replaced by decodable defaults.
//!
//! cargo fuzz run fuzz_module_record

#![no_main]

use libfuzzer_sys::fuzz_target;
use loranode::adapters::nvs::MemoryNvs;
use loranode::app::ports::StoragePort;
use loranode::modules::ultrasound::{USOUND_MODULE_ID, UltrasoundConfig};
use loranode::store::ConfigStore;

fuzz_target!(|data: &[u8]| {
    let mut nvs = MemoryNvs::new();
    let _ = nvs.write("modcfg", "m26", data);

    let mut store = ConfigStore::new(&mut nvs);
    if store.load_config::<UltrasoundConfig>(USOUND_MODULE_ID).is_err() {
        let defaults: UltrasoundConfig = store.load_or_default(USOUND_MODULE_ID);
        assert_eq!(defaults, UltrasoundConfig::default());
        assert!(store.load_config::<UltrasoundConfig>(USOUND_MODULE_ID).is_ok());
    }
});
