//! Application service: the cooperative-loop controller.
//!
//! [`Controller`] owns every port plus the network session, dispatcher,
//! playback controller, and power controller.  `main` calls
//! [`Controller::startup`] once and then [`Controller::iterate`] forever.
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!  Link ◀──▶ │ NetworkSession ──▶ Dispatcher ──▶ Action      │ ──▶ EventSink
//! Broker ◀──▶│                                   │           │
//!            │        PlaybackController ◀───────┤           │
//!  Audio ◀── │        PowerController    ◀───────┘           │
//!  Power ◀── └──────────────────────────────────────────────┘
//! ```
//!
//! One iteration, in order: network health check (may block), drain
//! inbound messages through the dispatcher, service the audio engine,
//! apply the volume envelope.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::DeviceConfig;
use crate::diagnostics::{DiagnosticReport, FIRMWARE_VERSION, HeapMetrics, PlaybackReport};
use crate::dispatch::{Dispatcher, PayloadError};
use crate::error::Result;
use crate::fsm::StateId;
use crate::network::NetworkSession;
use crate::playback::PlaybackController;
use crate::power::PowerController;

use super::commands::Action;
use super::events::{AppEvent, StopReason};
use super::ports::{
    AudioPort, BrokerPort, ClockPort, ConfigStore, EventSink, InboundMessage, LinkPort, PowerPort,
};

/// Every driven port the controller needs, handed over at construction.
pub struct Ports<L, B, A, P, D, C> {
    pub link: L,
    pub broker: B,
    pub audio: A,
    pub power: P,
    pub delay: D,
    pub clock: C,
}

pub struct Controller<L, B, A, P, D, C>
where
    L: LinkPort,
    B: BrokerPort,
    A: AudioPort,
    P: PowerPort,
    D: DelayNs,
    C: ClockPort,
{
    config: DeviceConfig,
    network: NetworkSession<L, B>,
    dispatcher: Dispatcher,
    playback: PlaybackController,
    power_ctl: PowerController,
    audio: A,
    power: P,
    delay: D,
    clock: C,
    suspended: bool,
    iterations: u64,
}

impl<L, B, A, P, D, C> Controller<L, B, A, P, D, C>
where
    L: LinkPort,
    B: BrokerPort,
    A: AudioPort,
    P: PowerPort,
    D: DelayNs,
    C: ClockPort,
{
    /// Wire the components together.  Does no I/O.
    pub fn new(config: DeviceConfig, ports: Ports<L, B, A, P, D, C>) -> Self {
        let mut network = NetworkSession::new(ports.link, ports.broker, &config);
        let dispatcher = Dispatcher::from_config(&config, network.device_id());
        network.set_subscriptions(dispatcher.topics());
        let playback = PlaybackController::new(&config);

        Self {
            config,
            network,
            dispatcher,
            playback,
            power_ctl: PowerController::new(),
            audio: ports.audio,
            power: ports.power,
            delay: ports.delay,
            clock: ports.clock,
            suspended: false,
            iterations: 0,
        }
    }

    /// Load configuration and bring the device online.
    ///
    /// A store that failed to open or validate, or a config that fails
    /// validation, is returned as an error: there is no safe default
    /// network identity, so the caller must halt.
    pub fn startup(
        store: &impl ConfigStore,
        ports: Ports<L, B, A, P, D, C>,
        sink: &mut impl EventSink,
    ) -> Result<Self> {
        store.status()?;
        let config = DeviceConfig::from_store(store)?;
        let mut controller = Self::new(config, ports);
        controller.bring_up(sink)?;
        Ok(controller)
    }

    /// Join the network, connect the broker, and prepare the audio engine.
    pub fn bring_up(&mut self, sink: &mut impl EventSink) -> Result<()> {
        self.network
            .ensure_link_up(&mut self.delay, &self.clock, sink)?;
        self.network
            .ensure_broker_connected(&mut self.delay, &self.clock, sink);

        self.audio.set_pinout(self.config.pins)?;
        self.audio.set_volume(self.config.envelope.target_volume);
        self.playback.start();

        info!(
            "Controller ready: device {} ({} topics)",
            self.network.device_id(),
            self.network.subscriptions().len()
        );
        sink.emit(&AppEvent::Started {
            device_id: self.network.device_id().to_owned(),
        });
        Ok(())
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Run one loop iteration.  No-op once the device has suspended.
    pub fn iterate(&mut self, sink: &mut impl EventSink) {
        if self.suspended {
            return;
        }
        self.iterations += 1;

        // 1. Link / broker health (blocks while recovering)
        if let Err(e) = self.network.service(&mut self.delay, &self.clock, sink) {
            error!("NET: recovery failed: {}", e);
            return;
        }

        // 2. Inbound messages
        while let Some(msg) = self.network.poll() {
            self.handle_message(&msg, sink);
            if self.suspended {
                return;
            }
        }

        // 3. Audio engine
        self.audio.service();
        while let Some(status) = self.audio.take_status() {
            debug!("{} {}", status.kind.tag(), status.text);
        }

        // 4. Envelope / end-of-stream
        self.playback.tick(&mut self.audio, sink);
    }

    /// Route one inbound message and run the resulting action.
    pub fn handle_message(&mut self, msg: &InboundMessage, sink: &mut impl EventSink) {
        debug!("MSG: '{}' ({} bytes)", msg.topic, msg.payload.len());
        match self.dispatcher.route(&msg.topic, &msg.payload) {
            Ok(Some(action)) => self.apply(action, sink),
            Ok(None) => {
                debug!("MSG: '{}' ignored", msg.topic);
                sink.emit(&AppEvent::MessageIgnored);
            }
            Err(PayloadError::Sleep(e)) => {
                warn!("SLEEP: request rejected: {}", e);
                sink.emit(&AppEvent::SuspendRejected);
            }
            Err(e) => {
                warn!("MSG: '{}': {}", msg.topic, e);
                sink.emit(&AppEvent::MessageIgnored);
            }
        }
    }

    fn apply(&mut self, action: Action, sink: &mut impl EventSink) {
        match action {
            Action::AdvertiseIdentity => {
                if let Err(e) = self.network.publish_identity(sink) {
                    warn!("NET: identity publish failed: {}", e);
                }
            }
            Action::Suspend { minutes } => {
                self.playback
                    .stop(StopReason::Suspend, &mut self.audio, sink);
                match self
                    .power_ctl
                    .schedule_suspend(minutes, &mut self.power, sink)
                {
                    Ok(()) => self.suspended = true,
                    Err(e) => warn!("SLEEP: {}", e),
                }
            }
            Action::Play { kind, url } => {
                self.playback.start_playback(
                    kind,
                    &url,
                    &mut self.audio,
                    &mut self.delay,
                    sink,
                );
            }
            Action::Diagnose => {
                let payload = self.diagnostics().to_json();
                if let Err(e) = self.network.publish_diagnostics(&payload, sink) {
                    warn!("NET: diagnose publish failed: {}", e);
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot for the `diagnose` command.
    pub fn diagnostics(&self) -> DiagnosticReport {
        let uptime_secs = self.clock.uptime_ms() / 1_000;
        let session = self
            .playback
            .session()
            .map(|s| (s.kind, s.url.as_str(), s.volume));
        DiagnosticReport {
            device_id: self.network.device_id().to_owned(),
            firmware: FIRMWARE_VERSION,
            uptime_secs,
            ip: DiagnosticReport::ip_string(self.network.local_ip()),
            link_up: self.network.link_up(),
            broker_connected: self.network.broker_connected(),
            broker_state: self.network.broker_state(),
            broker_sessions: self.network.broker_sessions(),
            last_reconnect_ms: self.network.last_reconnect_ms(),
            heap: HeapMetrics::collect(uptime_secs),
            playback: PlaybackReport::new(
                self.playback.state(),
                session,
                self.playback.elapsed_secs(),
            ),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> StateId {
        self.playback.state()
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn network(&self) -> &NetworkSession<L, B> {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut NetworkSession<L, B> {
        &mut self.network
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// A suspend was accepted.  On hardware the process never sees this.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
