//! Shared mutable context threaded through every FSM handler.
//!
//! `PlaybackContext` is the blackboard the state handlers read from and
//! write to: the latest audio engine snapshot, the active session, and the
//! audio commands the controller applies to the [`AudioPort`] afterwards.
//!
//! [`AudioPort`]: crate::app::ports::AudioPort

use crate::app::commands::SessionKind;
use crate::app::events::StopReason;
use crate::config::EnvelopeConfig;
use crate::envelope::Envelope;

// ---------------------------------------------------------------------------
// Engine snapshot (written by the controller before each tick)
// ---------------------------------------------------------------------------

/// What the audio engine reported this iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub running: bool,
    /// Engine-reported seconds played in the current stream.
    pub elapsed_secs: u32,
}

// ---------------------------------------------------------------------------
// Audio commands (written by handlers; consumed by the controller)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioCommands {
    /// New output volume, if it changed.
    pub volume: Option<u8>,
    /// Halt output and close the stream.
    pub stop: bool,
}

impl AudioCommands {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Playback session
// ---------------------------------------------------------------------------

/// One playback session.  Exists from the play command until the stream
/// is stopped; at most one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    pub kind: SessionKind,
    pub url: String,
    pub envelope: Envelope,
    /// Volume currently applied to the engine.
    pub volume: u8,
    /// Stream-open attempts used.
    pub retry_count: u32,
    /// Lowest volume applied since the fade began.
    pub fade_floor: Option<u8>,
}

impl PlaybackSession {
    pub fn new(kind: SessionKind, url: &str, envelope_config: &EnvelopeConfig) -> Self {
        let envelope = if kind.shaped() {
            Envelope::shaped(envelope_config)
        } else {
            Envelope::constant(envelope_config.target_volume)
        };
        Self {
            kind,
            url: url.to_owned(),
            envelope,
            volume: 0,
            retry_count: 0,
            fade_floor: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackContext
// ---------------------------------------------------------------------------

pub struct PlaybackContext {
    pub envelope_config: EnvelopeConfig,
    pub engine: EngineSnapshot,
    pub session: Option<PlaybackSession>,
    pub commands: AudioCommands,
    /// Set by whoever ends a session; taken by the controller for reporting.
    pub stop_reason: Option<StopReason>,
}

impl PlaybackContext {
    pub fn new(envelope_config: EnvelopeConfig) -> Self {
        Self {
            envelope_config,
            engine: EngineSnapshot::default(),
            session: None,
            commands: AudioCommands::default(),
            stop_reason: None,
        }
    }
}
