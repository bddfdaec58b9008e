//! Session manager — the single task that owns the network handle.
//!
//! [`SessionManager`] owns the join/retry state machine, its counters and
//! the uplink/downlink pipeline.  All I/O flows through the ports bundled
//! in [`SessionIo`], which the node assembles for every message.
//!
//! ```text
//!  Join / Network / Publish ──▶ ┌──────────────────────────┐ ──▶ NetworkPort
//!        (mailbox)              │      SessionManager      │ ──▶ EventSink
//!                               │  FSM · counters · pipe   │ ──▶ Kernel (deferred join)
//!                               └──────────────────────────┘
//! ```

pub mod backoff;

use embassy_time::Duration;
use log::{debug, error, info, warn};
use rand_core::RngCore;

use crate::app::commands::{JoinReason, Message, TaskId};
use crate::app::events::NodeEvent;
use crate::app::ports::{DiagnosticsPort, EventSink, NetworkPort, SendStatus, StoragePort};
use crate::config::{NodeSettings, UplinkFailurePolicy};
use crate::events::{Downlink, NetworkEvent};
use crate::fsm::context::{JoinState, SessionAction, SessionContext, SessionInput};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::kernel::Kernel;
use crate::modules::ModuleRegistry;
use crate::payload::ModuleData;
use crate::pipeline::{Demux, Pipeline, PipelineStats};

/// Everything the session task touches outside its own state.
pub struct SessionIo<'a> {
    pub network: &'a mut dyn NetworkPort,
    pub diagnostics: &'a mut dyn DiagnosticsPort,
    pub rng: &'a mut dyn RngCore,
    pub sink: &'a mut dyn EventSink,
    pub kernel: &'a mut Kernel,
    pub modules: &'a mut ModuleRegistry,
    pub storage: &'a mut dyn StoragePort,
}

pub struct SessionManager {
    fsm: Fsm,
    ctx: SessionContext,
    pipeline: Pipeline,
}

impl SessionManager {
    /// Build the manager in `Idle`.  Call [`start`](Self::start) next.
    pub fn new(settings: NodeSettings) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: SessionContext::new(settings),
            pipeline: Pipeline::new(),
        }
    }

    pub fn start(&mut self, sink: &mut dyn EventSink) {
        self.fsm.start(&mut self.ctx);
        self.flush_events(sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn join_state(&self) -> JoinState {
        self.ctx.join
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.ctx.settings
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Replace the active settings.  The node class follows the settings;
    /// counters are kept.
    pub fn update_settings(&mut self, settings: NodeSettings) {
        self.ctx.join.class = settings.class;
        self.ctx.settings = settings;
        info!("[LoRa] settings updated");
    }

    // ── Mailbox ───────────────────────────────────────────────

    /// Process one message from the session mailbox.
    pub fn handle(&mut self, msg: Message, io: &mut SessionIo<'_>) {
        match msg {
            Message::Join(reason) => {
                // A pending retry is superseded by this attempt.
                io.kernel.cancel(TaskId::Session);
                self.process(SessionInput::JoinRequested(reason), io);
            }
            Message::Network(event) => self.on_network_event(event, io),
            Message::Publish(data) => self.send_uplink(&data, io),
            Message::EnterLowPower => self.process(SessionInput::EnterLowPower, io),
            Message::Wake(reason) => debug!("[LoRa] unexpected wake ({:?})", reason),
        }
    }

    fn on_network_event(&mut self, event: NetworkEvent, io: &mut SessionIo<'_>) {
        match event {
            NetworkEvent::TxDone => {
                debug!("[LoRa] transmission done");
                self.process(SessionInput::UplinkAcked, io);
            }
            NetworkEvent::TxConfirmedFailed => {
                warn!("[LoRa] confirmed uplink not acknowledged");
                self.process(SessionInput::UplinkFailed, io);
            }
            NetworkEvent::Downlink(downlink) => self.on_downlink(&downlink, io),
            NetworkEvent::JoinNotification => info!("[LoRa] join notification received"),
            NetworkEvent::Other(code) => debug!("[LoRa] unhandled network event {}", code),
        }
    }

    fn on_downlink(&mut self, downlink: &Downlink, io: &mut SessionIo<'_>) {
        if downlink.is_bare_ack() {
            info!("[LoRa] ack received, RSSI {} dBm", downlink.rssi);
            io.sink.emit(&NodeEvent::BareAck { rssi: downlink.rssi });
            return;
        }
        debug!(
            "[LoRa] downlink: {} bytes, RSSI {} dBm, port {}",
            downlink.payload.len(),
            downlink.rssi,
            downlink.port
        );

        let outcome = self.pipeline.demux(
            &downlink.payload,
            downlink.rssi,
            io.modules,
            io.kernel,
            io.storage,
        );
        if let Demux::Routed {
            module,
            found,
            reply,
        } = outcome
        {
            io.sink.emit(&NodeEvent::DownlinkRouted { module, found });
            if let Some(reply) = reply {
                self.send_uplink(&reply, io);
            }
        }
    }

    // ── Uplink ────────────────────────────────────────────────

    fn send_uplink(&mut self, data: &ModuleData, io: &mut SessionIo<'_>) {
        let frame = match self.pipeline.encode(data, io.diagnostics) {
            Ok(frame) => frame,
            Err(e) => {
                error!("[LoRa] {}", e);
                io.sink.emit(&NodeEvent::PayloadTooLarge { len: data.len() });
                return;
            }
        };

        let status = io.network.send(&frame, data.as_ack);
        match status {
            SendStatus::Scheduled => {
                info!("[LoRa] uplink scheduled");
                io.sink.emit(&NodeEvent::UplinkScheduled {
                    frame_len: frame.len(),
                });
                return;
            }
            SendStatus::Busy => error!("[LoRa] MAC already busy"),
            SendStatus::NotJoined => error!("[LoRa] not joined to the network"),
            SendStatus::Unknown(code) => warn!("[LoRa] unknown send status {}", code),
        }
        io.sink.emit(&NodeEvent::UplinkRejected(status));

        match status {
            SendStatus::NotJoined if self.ctx.join.retries == 0 => {
                info!("[LoRa] attempting to rejoin");
                if let Err(e) = io.kernel.post(TaskId::Session, Message::Join(JoinReason::NotJoined)) {
                    warn!("[LoRa] could not queue join: {}", e);
                }
            }
            SendStatus::NotJoined => info!("[LoRa] waiting for join to complete"),
            SendStatus::Busy | SendStatus::Unknown(_)
                if self.ctx.settings.uplink_failure_policy == UplinkFailurePolicy::AnySendError =>
            {
                self.process(SessionInput::UplinkFailed, io);
            }
            _ => {}
        }
    }

    // ── State machine plumbing ────────────────────────────────

    /// Feed `input` to the state machine and execute the actions it asks
    /// for, feeding attach outcomes back until the machine settles.
    fn process(&mut self, input: SessionInput, io: &mut SessionIo<'_>) {
        let mut next = Some(input);
        while let Some(input) = next.take() {
            let from = self.fsm.current_state();
            if let Some(to) = self.fsm.dispatch(&input, &mut self.ctx) {
                io.sink.emit(&NodeEvent::StateChanged { from, to });
            }
            self.flush_events(io.sink);

            for action in core::mem::take(&mut self.ctx.actions) {
                match action {
                    SessionAction::Attach(mode) => {
                        let status = io.network.attach(mode);
                        debug!("[LoRa] attach({:?}) -> {:?}", mode, status);
                        next = Some(SessionInput::AttachOutcome(status));
                    }
                    SessionAction::ScheduleRetry {
                        lower_ms,
                        upper_ms,
                        attempt,
                        cause,
                    } => {
                        let window = backoff::BackoffBounds { lower_ms, upper_ms };
                        let delay_ms = backoff::pick_delay_ms(window, io.rng);
                        info!("[LoRa] next join attempt in {} ms", delay_ms);
                        let posted = io.kernel.post_after(
                            TaskId::Session,
                            Message::Join(JoinReason::Retry),
                            Duration::from_millis(u64::from(delay_ms)),
                        );
                        if let Err(e) = posted {
                            warn!("[LoRa] could not schedule join retry: {}", e);
                        }
                        io.sink.emit(&NodeEvent::JoinRetryScheduled {
                            attempt,
                            delay_ms,
                            cause,
                        });
                    }
                }
            }
        }
    }

    fn flush_events(&mut self, sink: &mut dyn EventSink) {
        for event in core::mem::take(&mut self.ctx.events) {
            sink.emit(&event);
        }
    }
}
