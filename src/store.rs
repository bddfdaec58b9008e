//! Persistent per-module configuration records.
//!
//! Every module owns one fixed-size record in the `modcfg` namespace of the
//! storage port:
//!
//! ```text
//!  [validity][schema_version][postcard body …][zero padding]   (32 bytes)
//! ```
//!
//! `save` stamps the validity byte before writing.  A record whose validity
//! byte is zero or the erased-flash value, whose schema version differs, or
//! whose body fails to decode is treated as absent: the module applies its
//! factory defaults and saves them.

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{StorageError, StoragePort};
use crate::error::StoreError;
use crate::payload::ModuleId;

/// Size of every module configuration record.
pub const RECORD_SIZE: usize = 32;
/// Validity byte stamped by [`ConfigStore::save`].
pub const VALID_MARKER: u8 = 0x01;
/// Content of never-written flash.
pub const ERASED_MARKER: u8 = 0xFF;

const NAMESPACE: &str = "modcfg";
/// Validity byte plus schema version.
const HEADER_LEN: usize = 2;

/// Whether `marker` flags a record as written.
pub fn is_valid_marker(marker: u8) -> bool {
    marker != 0 && marker != ERASED_MARKER
}

/// A typed configuration record.
pub trait ModuleConfig: Serialize + DeserializeOwned + Default {
    /// Bumped whenever the serialized layout changes.
    const SCHEMA_VERSION: u8;
}

/// Record-level access to the storage port.
pub struct ConfigStore<'a> {
    storage: &'a mut dyn StoragePort,
}

impl<'a> ConfigStore<'a> {
    pub fn new(storage: &'a mut dyn StoragePort) -> Self {
        Self { storage }
    }

    /// Read the record for `id` into `buf`.  Returns `false` when no record
    /// of exactly `buf.len()` bytes exists or its validity byte is unset.
    pub fn load(&self, id: ModuleId, buf: &mut [u8]) -> bool {
        let key = record_key(id);
        match self.storage.read(NAMESPACE, &key, buf) {
            Ok(len) if len == buf.len() => buf.first().is_some_and(|&m| is_valid_marker(m)),
            Ok(len) => {
                warn!("[store] record {} has {} bytes, expected {}", id, len, buf.len());
                false
            }
            Err(StorageError::NotFound) => false,
            Err(e) => {
                warn!("[store] reading record {} failed: {}", id, e);
                false
            }
        }
    }

    /// Stamp the validity byte of `buf` and write it as the record for `id`.
    pub fn save(&mut self, id: ModuleId, buf: &mut [u8]) -> Result<(), StoreError> {
        let Some(marker) = buf.first_mut() else {
            return Err(StoreError::RecordTooLarge);
        };
        *marker = VALID_MARKER;
        self.storage
            .write(NAMESPACE, &record_key(id), buf)
            .map_err(|e| {
                warn!("[store] writing record {} failed: {}", id, e);
                StoreError::Backend
            })
    }

    /// Forget the record for `id`.
    pub fn erase(&mut self, id: ModuleId) -> Result<(), StoreError> {
        self.storage
            .delete(NAMESPACE, &record_key(id))
            .map_err(|_| StoreError::Backend)
    }

    /// Decode the typed record for `id`.
    pub fn load_config<T: ModuleConfig>(&self, id: ModuleId) -> Result<T, StoreError> {
        let mut buf = [0u8; RECORD_SIZE];
        if !self.load(id, &mut buf) {
            return Err(StoreError::Absent);
        }
        if buf[1] != T::SCHEMA_VERSION {
            warn!(
                "[store] record {} has schema {}, expected {}",
                id,
                buf[1],
                T::SCHEMA_VERSION
            );
            return Err(StoreError::Corrupt);
        }
        postcard::from_bytes(&buf[HEADER_LEN..]).map_err(|_| StoreError::Corrupt)
    }

    /// Encode and write the typed record for `id`.
    pub fn save_config<T: ModuleConfig>(&mut self, id: ModuleId, config: &T) -> Result<(), StoreError> {
        let mut buf = [0u8; RECORD_SIZE];
        buf[1] = T::SCHEMA_VERSION;
        postcard::to_slice(config, &mut buf[HEADER_LEN..]).map_err(|_| StoreError::RecordTooLarge)?;
        self.save(id, &mut buf)
    }

    /// Load the record for `id`, or apply and persist factory defaults.
    pub fn load_or_default<T: ModuleConfig>(&mut self, id: ModuleId) -> T {
        match self.load_config(id) {
            Ok(config) => config,
            Err(e) => {
                info!("[store] module {} config {}, applying defaults", id, e);
                let config = T::default();
                if let Err(e) = self.save_config(id, &config) {
                    warn!("[store] saving defaults for module {} failed: {}", id, e);
                }
                config
            }
        }
    }
}

fn record_key(id: ModuleId) -> heapless::String<8> {
    let mut key = heapless::String::new();
    // "m" plus at most three digits always fits.
    let _ = core::fmt::write(&mut key, format_args!("m{}", id.raw()));
    key
}
