//! Node configuration parameters
//!
//! All tunable parameters of the network session.  Values persist in the
//! settings namespace of the storage port and can be changed from the
//! shell (`set <key> <value>`).

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::StoragePort;

const SETTINGS_NAMESPACE: &str = "node";
const SETTINGS_KEY: &str = "settings";
const SETTINGS_MAX_BLOB: usize = 64;

/// Upper bound accepted for `max_retr`.
pub const MAX_RETR_LIMIT: u8 = 5;

/// Power-scheduling mode of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeClass {
    /// Sleeps between cycles; gives up joining after `max_retr` attempts.
    A,
    /// Always listening; retries joining indefinitely.
    C,
}

/// How the session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Over-the-air activation (join handshake).
    Otaa,
    /// Activation by personalisation (static session keys).
    Abp,
}

/// Which uplink outcomes count toward the rejoin trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UplinkFailurePolicy {
    /// Only confirmed uplinks that were never acknowledged.
    ConfirmedOnly,
    /// Additionally `Busy` and unknown `send` results.
    AnySendError,
}

/// Parameters of the randomised join backoff.
///
/// Bounds for the `n`-th retry are
/// `[lower_base_ms + (n-1)·step_ms, upper_base_ms + (n-1)·step_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinBackoff {
    /// Saturation point of the join-retry counter (caps the delay at ~1 h).
    pub retry_ceiling: u8,
    pub lower_base_ms: u32,
    pub upper_base_ms: u32,
    pub step_ms: u32,
}

impl Default for JoinBackoff {
    fn default() -> Self {
        Self {
            retry_ceiling: 120,
            lower_base_ms: 10_000,
            upper_base_ms: 30_000,
            step_ms: 30_000,
        }
    }
}

/// Core node configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    // --- Session ---
    pub class: NodeClass,
    pub activation: Activation,
    /// Default data rate (0 slowest … 6 fastest).
    pub data_rate: u8,
    /// Adaptive data rate.
    pub adr: bool,
    /// Send uplinks as confirmed frames.
    pub confirmed: bool,
    /// Maximum retransmissions of confirmed data; also the join give-up
    /// point for class A and the uplink-failure rejoin threshold.
    pub max_retr: u8,

    // --- Retry ---
    pub backoff: JoinBackoff,
    pub uplink_failure_policy: UplinkFailurePolicy,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            class: NodeClass::A,
            activation: Activation::Otaa,
            data_rate: 0,
            adr: true,
            confirmed: false,
            max_retr: 2,
            backoff: JoinBackoff::default(),
            uplink_failure_policy: UplinkFailurePolicy::ConfirmedOnly,
        }
    }
}

impl NodeSettings {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.data_rate > 6 {
            return Err("data_rate must be 0–6");
        }
        if self.max_retr > MAX_RETR_LIMIT {
            return Err("max_retr must be 0–5");
        }
        if self.backoff.retry_ceiling == 0 {
            return Err("retry_ceiling must be non-zero");
        }
        if self.backoff.lower_base_ms >= self.backoff.upper_base_ms {
            return Err("lower_base_ms must be below upper_base_ms");
        }
        Ok(())
    }

    /// Set `max_retr`, clamping to [`MAX_RETR_LIMIT`].
    pub fn set_max_retr(&mut self, value: u8) {
        self.max_retr = value.min(MAX_RETR_LIMIT);
    }
}

/// Load settings from storage, falling back to defaults when the blob is
/// absent, undecodable or out of range.  Returns `(settings, was_stored)`.
pub fn load_settings(storage: &dyn StoragePort) -> (NodeSettings, bool) {
    let mut buf = [0u8; SETTINGS_MAX_BLOB];
    let Ok(len) = storage.read(SETTINGS_NAMESPACE, SETTINGS_KEY, &mut buf) else {
        info!("[config] no stored node settings, using defaults");
        return (NodeSettings::default(), false);
    };
    match postcard::from_bytes::<NodeSettings>(&buf[..len]) {
        Ok(s) if s.validate().is_ok() => (s, true),
        Ok(_) | Err(_) => {
            warn!("[config] stored node settings invalid, using defaults");
            (NodeSettings::default(), false)
        }
    }
}

/// Validate and persist settings.
pub fn save_settings(
    storage: &mut dyn StoragePort,
    settings: &NodeSettings,
) -> Result<(), crate::error::StoreError> {
    settings
        .validate()
        .map_err(|_| crate::error::StoreError::Corrupt)?;
    let bytes = postcard::to_allocvec(settings).map_err(|_| crate::error::StoreError::Corrupt)?;
    storage
        .write(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes)
        .map_err(|_| crate::error::StoreError::Backend)
}
