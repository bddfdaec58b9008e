//! Ultrasonic range-finder module (`usound`).
//!
//! Two cycles: a regular distance report every `publish_period_min`
//! minutes (0 disables it) and a 24-hour heartbeat.  The transducer sits on
//! a switched rail that must settle for 500 ms before each measurement.
//!
//! Downlink sub-commands:
//!
//! | byte 0 | command       | args            | reply          |
//! |--------|---------------|-----------------|----------------|
//! | 0      | `SET_PERIOD`  | period (min, u8)| `{id, 0x00}`   |
//! | 1      | `POLL`        | –               | none (report)  |
//! | 2      | `INIT_SENSOR` | –               | `{id, 0x00}`   |
//!
//! Anything else, or a malformed length, replies `{id, 0xFF}`.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::commands::{ModuleTask, WakeReason};
use crate::app::ports::{EchoParams, PowerControl, RangeFinder};
use crate::payload::{ModuleData, ModuleId, REPLY_FAIL, REPLY_OK};
use crate::shell::ShellStatus;
use crate::store::ModuleConfig;

use super::periodic::{self, HEARTBEAT_INTERVAL, ReportMode};
use super::{CommandReply, ModuleCtx, SensorModule};

pub const USOUND_MODULE_ID: ModuleId = ModuleId(0x1A);

const NAME: &str = "usound";
const POWER_SETTLE_MS: u32 = 500;
const TASKS: &[ModuleTask] = &[ModuleTask::Regular, ModuleTask::Heartbeat];

const CMD_SET_PERIOD: u8 = 0;
const CMD_POLL: u8 = 1;
const CMD_INIT_SENSOR: u8 = 2;

/// Persisted settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UltrasoundConfig {
    pub publish_period_min: u8,
    /// Echo detection sensitivity.
    pub sensitivity: u16,
    pub min_distance_mm: u16,
    pub max_distance_mm: u16,
    /// Report ceiling in threshold mode.
    pub threshold_mm: u16,
    pub mode: ReportMode,
}

impl Default for UltrasoundConfig {
    fn default() -> Self {
        Self {
            publish_period_min: 15,
            sensitivity: 50,
            min_distance_mm: 400,
            max_distance_mm: 6000,
            threshold_mm: 500,
            mode: ReportMode::Always,
        }
    }
}

impl ModuleConfig for UltrasoundConfig {
    const SCHEMA_VERSION: u8 = 1;
}

pub struct UltrasoundModule {
    config: UltrasoundConfig,
    sensor: Box<dyn RangeFinder>,
    power: Box<dyn PowerControl>,
    /// The next regular report answers a poll.
    polled: bool,
    ready: bool,
}

impl UltrasoundModule {
    pub fn new(sensor: Box<dyn RangeFinder>, power: Box<dyn PowerControl>) -> Self {
        Self {
            config: UltrasoundConfig::default(),
            sensor,
            power,
            polled: false,
            ready: false,
        }
    }

    pub fn config(&self) -> &UltrasoundConfig {
        &self.config
    }

    /// Whether the transducer came up during [`init`](SensorModule::init).
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn echo_params(&self) -> EchoParams {
        EchoParams {
            sensitivity: self.config.sensitivity,
            min_distance_mm: self.config.min_distance_mm,
            max_distance_mm: self.config.max_distance_mm,
        }
    }

    fn init_sensor(&mut self) -> bool {
        info!("[usound] initializing ultrasound distance meter");
        let params = self.echo_params();
        self.ready = self.sensor.init(&params);
        self.ready
    }

    fn save_config(&self, ctx: &mut ModuleCtx<'_>) {
        let id = ctx.id();
        if let Err(e) = ctx.store().save_config(id, &self.config) {
            warn!("[usound] saving config failed: {}", e);
        }
    }

    fn reset_config(&mut self, ctx: &mut ModuleCtx<'_>) {
        self.config = UltrasoundConfig::default();
        self.save_config(ctx);
        let params = self.echo_params();
        self.sensor.configure(&params);
    }

    /// Power the rail, wait for it to settle, sample, power down.
    fn measure(&mut self) -> i32 {
        self.power.enable_and_settle(POWER_SETTLE_MS);
        let range = self.sensor.measure();
        self.power.disable();
        info!("[usound] echo distance {} mm", range);
        range
    }

    fn report(&self, range: i32) -> ModuleData {
        let mut data = ModuleData::new();
        // Five bytes always fit.
        let _ = data.push(USOUND_MODULE_ID.raw());
        let _ = data.extend_from_slice(&range.to_le_bytes());
        data
    }

    fn set_period(&mut self, minutes: u8, ctx: &mut ModuleCtx<'_>) {
        ctx.disarm(ModuleTask::Regular);
        self.config.publish_period_min = minutes;
        self.save_config(ctx);

        if minutes > 0 {
            periodic::rearm(ctx, ModuleTask::Regular, periodic::period_from_minutes(minutes));
            info!("[usound] period set to {} minutes", minutes);
        } else {
            info!("[usound] timer stopped");
        }
    }

    fn poll(&mut self, ctx: &mut ModuleCtx<'_>) {
        self.polled = true;
        if let Err(e) = ctx.wake(ModuleTask::Regular, WakeReason::Poll) {
            warn!("[usound] poll dropped: {}", e);
        }
    }

    fn run_regular(&mut self, reason: WakeReason, ctx: &mut ModuleCtx<'_>) {
        let ack = self.polled || reason == WakeReason::Poll;
        self.polled = false;

        let range = self.measure();
        let data = self.report(range).with_ack(ack);
        if periodic::should_report(self.config.mode, self.config.threshold_mm, range) {
            ctx.publish(data);
        } else {
            info!("[usound] distance above threshold, ignoring");
        }

        periodic::rearm(
            ctx,
            ModuleTask::Regular,
            periodic::period_from_minutes(self.config.publish_period_min),
        );
    }

    fn arm_cycles(&self, ctx: &mut ModuleCtx<'_>) {
        periodic::rearm(ctx, ModuleTask::Heartbeat, Some(HEARTBEAT_INTERVAL));
        periodic::rearm(
            ctx,
            ModuleTask::Regular,
            periodic::period_from_minutes(self.config.publish_period_min),
        );
    }

    fn run_heartbeat(&mut self, ctx: &mut ModuleCtx<'_>) {
        ctx.publish(periodic::heartbeat_payload(USOUND_MODULE_ID));
        periodic::rearm(ctx, ModuleTask::Heartbeat, Some(HEARTBEAT_INTERVAL));
    }

    fn print_settings(&self) {
        let c = &self.config;
        info!("[usound] current settings:");
        info!("period: {} m", c.publish_period_min);
        info!("sens: {}", c.sensitivity);
        info!("min: {} mm", c.min_distance_mm);
        info!("max: {} mm", c.max_distance_mm);
        info!(
            "mode: {}",
            match c.mode {
                ReportMode::Always => "distance",
                ReportMode::Threshold => "threshold",
            }
        );
        info!("threshold: {} mm", c.threshold_mm);
    }

    fn print_usage(&self) {
        info!("usound - ultrasound rangefinder");
        info!("usound get - get results now");
        info!("usound send - get and send results now");
        info!("usound period <N> - set period to N minutes");
        info!("usound sens <N> - set echo detection sensitivity");
        info!("usound min <N> - set minimum distance in mm");
        info!("usound max <N> - set maximum distance in mm");
        info!("usound mode <distance|threshold> - set sensor mode");
        info!("usound threshold <N> - set threshold in mm for threshold mode");
        info!("usound reset - reset settings to default");
    }
}

impl SensorModule for UltrasoundModule {
    fn id(&self) -> ModuleId {
        USOUND_MODULE_ID
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn help(&self) -> &'static str {
        "type 'usound' for commands list"
    }

    fn tasks(&self) -> &'static [ModuleTask] {
        TASKS
    }

    fn init(&mut self, ctx: &mut ModuleCtx<'_>) -> bool {
        self.power.disable();
        let id = ctx.id();
        self.config = ctx.store().load_or_default(id);
        self.print_settings();

        if !self.init_sensor() {
            error!("[usound] unable to init sensor!");
            return false;
        }

        self.arm_cycles(ctx);
        true
    }

    fn handle_command(&mut self, cmd: &ModuleData, ctx: &mut ModuleCtx<'_>) -> CommandReply {
        let ok = || CommandReply::Ok(ModuleData::status_reply(USOUND_MODULE_ID, REPLY_OK));
        let fail = || CommandReply::Failed(ModuleData::status_reply(USOUND_MODULE_ID, REPLY_FAIL));

        match cmd.as_bytes() {
            [CMD_SET_PERIOD, period] => {
                self.set_period(*period, ctx);
                ok()
            }
            [CMD_POLL, ..] => {
                self.poll(ctx);
                CommandReply::NoData
            }
            [CMD_INIT_SENSOR, ..] => {
                let was_ready = self.is_ready();
                if !self.init_sensor() {
                    return fail();
                }
                // A sensor that failed at boot never armed its cycles.
                if !was_ready {
                    self.arm_cycles(ctx);
                }
                ok()
            }
            [CMD_SET_PERIOD, ..] => {
                warn!("[usound] SET_PERIOD expects exactly one argument byte");
                fail()
            }
            other => {
                warn!("[usound] unknown command {:02x?}", other.first());
                fail()
            }
        }
    }

    fn on_wake(&mut self, task: ModuleTask, reason: WakeReason, ctx: &mut ModuleCtx<'_>) {
        match task {
            ModuleTask::Regular => self.run_regular(reason, ctx),
            ModuleTask::Heartbeat => self.run_heartbeat(ctx),
        }
    }

    fn shell(&mut self, args: &[&str], ctx: &mut ModuleCtx<'_>) -> ShellStatus {
        let Some(&cmd) = args.get(1) else {
            self.print_usage();
            self.print_settings();
            return ShellStatus::Ok;
        };
        let arg = args.get(2).copied();

        match (cmd, arg) {
            ("get", _) => {
                self.measure();
            }
            ("send", _) => self.poll(ctx),
            ("period", Some(v)) => match v.parse::<u8>() {
                Ok(minutes) => self.set_period(minutes, ctx),
                Err(_) => return ShellStatus::Usage,
            },
            ("sens" | "min" | "max" | "threshold", Some(v)) => {
                let Ok(value) = v.parse::<u16>() else {
                    return ShellStatus::Usage;
                };
                match cmd {
                    "sens" => self.config.sensitivity = value,
                    "min" => self.config.min_distance_mm = value,
                    "max" => self.config.max_distance_mm = value,
                    _ => self.config.threshold_mm = value,
                }
                if cmd != "threshold" {
                    let params = self.echo_params();
                    self.sensor.configure(&params);
                }
                self.save_config(ctx);
            }
            ("mode", Some(m)) => {
                match m {
                    "threshold" => {
                        info!("[usound] threshold mode");
                        self.config.mode = ReportMode::Threshold;
                    }
                    "distance" => {
                        info!("[usound] distance mode");
                        self.config.mode = ReportMode::Always;
                    }
                    _ => {
                        warn!("[usound] unknown mode");
                        return ShellStatus::Usage;
                    }
                }
                self.save_config(ctx);
            }
            ("reset", _) => self.reset_config(ctx),
            _ => {
                warn!("[usound] unknown command");
                return ShellStatus::Usage;
            }
        }
        ShellStatus::Ok
    }
}
