//! Playback controller: owns the single audio session.
//!
//! Wraps the playback [`Fsm`] and translates its [`AudioCommands`] into
//! [`AudioPort`] calls, the same way every tick:
//!
//! ```text
//!  AudioPort ──▶ EngineSnapshot ──▶ Fsm::tick ──▶ AudioCommands ──▶ AudioPort
//! ```
//!
//! [`AudioCommands`]: crate::fsm::context::AudioCommands

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::commands::SessionKind;
use crate::app::events::{AppEvent, StopReason};
use crate::app::ports::{AudioPort, EventSink};
use crate::config::DeviceConfig;
use crate::fsm::context::{EngineSnapshot, PlaybackContext, PlaybackSession};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::retry::{RetryOutcome, RetryPolicy};

pub struct PlaybackController {
    fsm: Fsm,
    ctx: PlaybackContext,
    open_policy: RetryPolicy,
}

impl PlaybackController {
    pub fn new(config: &DeviceConfig) -> Self {
        let open_policy = RetryPolicy::bounded(
            config.retry.stream_open_attempts,
            config.retry.stream_open_delay_ms,
        )
        .delay_before_attempt();
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: PlaybackContext::new(config.envelope),
            open_policy,
        }
    }

    /// Enter the initial state.  Call once before the first tick.
    pub fn start(&mut self) {
        self.fsm.start(&mut self.ctx);
        self.ctx.commands.clear();
    }

    // ── Commands ──────────────────────────────────────────────

    /// Open `url` as a new session.  An active session is torn down first.
    ///
    /// Blocks for up to `attempts × delay` while the engine connects.
    /// Returns whether the stream is now playing; on exhaustion the
    /// controller is back in `Idle` and nothing else is affected.
    pub fn start_playback(
        &mut self,
        kind: SessionKind,
        url: &str,
        audio: &mut impl AudioPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.fsm.current_state().is_active() {
            info!("Playback: replacing active session");
            self.stop(StopReason::Replaced, audio, sink);
        }

        info!("Playback: opening {:?} stream '{}'", kind, url);
        self.ctx.session = Some(PlaybackSession::new(kind, url, &self.ctx.envelope_config));
        self.force(StateId::Connecting, audio, sink);

        let outcome = self.open_policy.run(delay, |_| {
            audio.connect_to_host(url);
            audio.is_running()
        });

        let attempts = outcome.attempts();
        if let Some(session) = self.ctx.session.as_mut() {
            session.retry_count = attempts;
        }

        match outcome {
            RetryOutcome::Succeeded { .. } => {
                self.ctx.engine = EngineSnapshot {
                    running: true,
                    elapsed_secs: audio.current_time_secs(),
                };
                sink.emit(&AppEvent::PlaybackStarted { kind, attempts });
                self.force(StateId::Playing, audio, sink);
                true
            }
            RetryOutcome::Exhausted { .. } => {
                warn!(
                    "Playback: stream did not start after {} attempts, staying idle",
                    attempts
                );
                self.ctx.stop_reason = None;
                sink.emit(&AppEvent::PlaybackAborted { attempts });
                self.force(StateId::Idle, audio, sink);
                false
            }
        }
    }

    /// End the active session.  No-op when idle.
    pub fn stop(&mut self, reason: StopReason, audio: &mut impl AudioPort, sink: &mut impl EventSink) {
        if !self.fsm.current_state().is_active() {
            return;
        }
        self.ctx.stop_reason = Some(reason);
        self.force(StateId::Idle, audio, sink);
    }

    // ── Per-iteration ─────────────────────────────────────────

    /// Poll the engine and apply the envelope.  Call once per loop
    /// iteration after the engine has been serviced.
    pub fn tick(&mut self, audio: &mut impl AudioPort, sink: &mut impl EventSink) {
        let prev = self.fsm.current_state();
        if prev.is_active() {
            self.ctx.engine = EngineSnapshot {
                running: audio.is_running(),
                elapsed_secs: audio.current_time_secs(),
            };
        }

        self.fsm.tick(&mut self.ctx);

        let now = self.fsm.current_state();
        if now != prev {
            sink.emit(&AppEvent::StateChanged { from: prev, to: now });
        }
        self.apply_commands(audio, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.ctx.session.as_ref()
    }

    /// Volume applied to the engine by the active session.
    pub fn volume(&self) -> Option<u8> {
        self.ctx.session.as_ref().map(|s| s.volume)
    }

    /// Last engine-reported elapsed seconds.
    pub fn elapsed_secs(&self) -> u32 {
        self.ctx.engine.elapsed_secs
    }

    // ── Internal ──────────────────────────────────────────────

    fn force(&mut self, to: StateId, audio: &mut impl AudioPort, sink: &mut impl EventSink) {
        let from = self.fsm.current_state();
        self.fsm.force_transition(to, &mut self.ctx);
        if from != to {
            sink.emit(&AppEvent::StateChanged { from, to });
        }
        self.apply_commands(audio, sink);
    }

    /// Translate FSM audio commands into port calls.
    fn apply_commands(&mut self, audio: &mut impl AudioPort, sink: &mut impl EventSink) {
        let cmds = self.ctx.commands;
        self.ctx.commands.clear();

        if let Some(volume) = cmds.volume {
            audio.set_volume(volume);
            sink.emit(&AppEvent::VolumeChanged {
                volume,
                elapsed_secs: self.ctx.engine.elapsed_secs,
            });
        }

        if cmds.stop {
            audio.stop();
            self.ctx.engine = EngineSnapshot::default();
            if let Some(reason) = self.ctx.stop_reason.take() {
                info!("Playback: stopped ({:?})", reason);
                sink.emit(&AppEvent::PlaybackStopped(reason));
            }
        }
    }
}
