//! Shared periodic-report pattern.
//!
//! Every module cycle follows the same protocol: wake (timer or poll),
//! measure, decide whether to report, publish, re-arm.  The pieces that do
//! not depend on what is measured live here.

use embassy_time::Duration;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::commands::ModuleTask;
use crate::payload::{ModuleData, ModuleId};

use super::ModuleCtx;

/// Liveness report interval, independent of any module configuration.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// When a regular measurement becomes a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportMode {
    /// Report every reading.
    Always,
    /// Report only physically valid readings below the threshold.
    Threshold,
}

/// Report decision for one reading.
pub fn should_report(mode: ReportMode, threshold: u16, reading: i32) -> bool {
    match mode {
        ReportMode::Always => true,
        ReportMode::Threshold => reading > 0 && reading < i32::from(threshold),
    }
}

/// Report period for a setting in minutes; `None` when disabled.
pub fn period_from_minutes(minutes: u8) -> Option<Duration> {
    (minutes > 0).then(|| Duration::from_secs(u64::from(minutes) * 60))
}

/// Re-arm `task` after `period`, or leave it idle when disabled.
pub fn rearm(ctx: &mut ModuleCtx<'_>, task: ModuleTask, period: Option<Duration>) {
    let Some(period) = period else {
        debug!("[mod {}] {:?} cycle disabled, not re-arming", ctx.id(), task);
        return;
    };
    if let Err(e) = ctx.arm(task, period) {
        warn!("[mod {}] cannot arm {:?}: {}", ctx.id(), task, e);
    }
}

/// `{id, 0, 0, 0, 0}`: a report that carries no reading.
pub fn heartbeat_payload(id: ModuleId) -> ModuleData {
    let mut data = ModuleData::status_reply(id, 0);
    // Five bytes always fit.
    let _ = data.extend_from_slice(&[0, 0, 0]);
    data
}
