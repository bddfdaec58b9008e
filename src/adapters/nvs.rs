//! In-memory key-value storage backend.
//!
//! Implements [`StoragePort`] for the host simulation and for tests.  Keys
//! are namespaced as `namespace::key`, matching the flash layout the node
//! uses on hardware (one namespace for node settings, one for module
//! records).

use std::cell::RefCell;
use std::collections::HashMap;

use log::info;

use crate::app::ports::{StorageError, StoragePort};

#[derive(Debug, Default)]
pub struct MemoryNvs {
    store: RefCell<HashMap<String, Vec<u8>>>,
    /// Fail every write with `IoError` (fault injection).
    read_only: bool,
}

impl MemoryNvs {
    pub fn new() -> Self {
        info!("[nvs] simulation backend");
        Self::default()
    }

    /// A backend whose writes always fail.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Number of stored keys across all namespaces.
    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }
}

impl StoragePort for MemoryNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let composite = Self::composite_key(namespace, key);
        match self.store.borrow().get(&composite) {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::IoError);
        }
        let composite = Self::composite_key(namespace, key);
        self.store.borrow_mut().insert(composite, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let composite = Self::composite_key(namespace, key);
        self.store.borrow_mut().remove(&composite);
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        let composite = Self::composite_key(namespace, key);
        self.store.borrow().contains_key(&composite)
    }
}
