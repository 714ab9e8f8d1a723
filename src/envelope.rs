//! Time-based volume envelope.
//!
//! ```text
//!  volume
//!  target ┤      ┌────────┐
//!         │     ╱          ╲            fade-out: target − (t − start)
//!         │    ╱            ╲
//!         │   ╱ fade-in      ╲
//!       1 ┤  ╱  step·t        ╲ ← stop
//!         └─┴───────────┴──────┴──▶ elapsed seconds
//!           0       fade_start
//! ```
//!
//! Driven by the audio engine's own elapsed-seconds counter, polled once
//! per loop iteration, so its resolution is one second at best.

use crate::config::EnvelopeConfig;

/// What the envelope asks for at a given elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStep {
    /// Play at this volume.
    Volume(u8),
    /// Volume has reached silence (≤ 1): stop the stream.
    Stop,
}

/// Envelope for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    target: u8,
    fade_start_secs: u32,
    fade_in_step: Option<u8>,
    shaped: bool,
}

impl Envelope {
    /// Envelope for a ringing session.
    pub fn shaped(cfg: &EnvelopeConfig) -> Self {
        Self {
            target: cfg.target_volume,
            fade_start_secs: cfg.fade_start_secs,
            fade_in_step: cfg.fade_in.then_some(cfg.fade_in_step),
            shaped: true,
        }
    }

    /// Constant volume for call and live sessions.
    pub fn constant(target: u8) -> Self {
        Self {
            target,
            fade_start_secs: 0,
            fade_in_step: None,
            shaped: false,
        }
    }

    /// Whether `elapsed_secs` is past the fade-out threshold.
    pub fn fading(&self, elapsed_secs: u32) -> bool {
        self.shaped && elapsed_secs >= self.fade_start_secs
    }

    /// Volume (or stop) at `elapsed_secs`.
    pub fn step(&self, elapsed_secs: u32) -> EnvelopeStep {
        if !self.shaped {
            return EnvelopeStep::Volume(self.target);
        }

        if elapsed_secs < self.fade_start_secs {
            let volume = match self.fade_in_step {
                Some(step) => {
                    let ramp = u64::from(step) * u64::from(elapsed_secs);
                    ramp.min(u64::from(self.target)) as u8
                }
                None => self.target,
            };
            return EnvelopeStep::Volume(volume);
        }

        let past = i64::from(elapsed_secs - self.fade_start_secs);
        let volume = i64::from(self.target) - past;
        if volume <= 1 {
            EnvelopeStep::Stop
        } else {
            EnvelopeStep::Volume(volume as u8)
        }
    }
}
