//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers with no closures and no
//! dynamic dispatch.
//!
//! ```text
//!  IDLE ──[play]──▶ CONNECTING ──[engine running]──▶ PLAYING
//!    ▲                  │                              │
//!    │          [retry bound hit]              [t ≥ fade start]
//!    │                  │                              ▼
//!    ├──────────────────┘                          FADING_OUT
//!    │                                                 │
//!    └────────[volume ≤ 1 │ end of stream │ replaced]──┘
//! ```
//!
//! `Connecting` has no tick behaviour: the controller opens the stream
//! synchronously and forces the outcome.

use log::info;

use super::context::{AudioCommands, PlaybackContext, PlaybackSession};
use super::{StateDescriptor, StateId};
use crate::app::events::StopReason;
use crate::envelope::EnvelopeStep;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Connecting
        StateDescriptor {
            id: StateId::Connecting,
            name: "Connecting",
            on_enter: None,
            on_exit: None,
            on_update: connecting_update,
        },
        // Index 2: Playing
        StateDescriptor {
            id: StateId::Playing,
            name: "Playing",
            on_enter: Some(playing_enter),
            on_exit: None,
            on_update: playing_update,
        },
        // Index 3: FadingOut
        StateDescriptor {
            id: StateId::FadingOut,
            name: "FadingOut",
            on_enter: None,
            on_exit: None,
            on_update: fading_update,
        },
    ]
}

/// Queue a volume change if it differs from what the engine has.
fn set_volume(session: &mut PlaybackSession, commands: &mut AudioCommands, volume: u8) {
    if session.volume != volume {
        session.volume = volume;
        commands.volume = Some(volume);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut PlaybackContext) {
    // Tear down whatever session led here.
    if let Some(session) = ctx.session.take() {
        ctx.commands.volume = None;
        ctx.commands.stop = true;
        info!("IDLE: session for '{}' closed", session.url);
    }
}

fn idle_update(_ctx: &mut PlaybackContext) -> Option<StateId> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING state
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_update(_ctx: &mut PlaybackContext) -> Option<StateId> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PLAYING state: steady volume, or fade-in ramp for shaped sessions
// ═══════════════════════════════════════════════════════════════════════════

fn playing_enter(ctx: &mut PlaybackContext) {
    let elapsed = ctx.engine.elapsed_secs;
    if let Some(session) = ctx.session.as_mut() {
        if let EnvelopeStep::Volume(v) = session.envelope.step(elapsed) {
            session.volume = v;
            ctx.commands.volume = Some(v);
        }
        info!(
            "PLAYING: {:?} session at volume {} (attempts={})",
            session.kind, session.volume, session.retry_count
        );
    }
}

fn playing_update(ctx: &mut PlaybackContext) -> Option<StateId> {
    if !ctx.engine.running {
        ctx.stop_reason = Some(StopReason::EndOfStream);
        return Some(StateId::Idle);
    }

    let elapsed = ctx.engine.elapsed_secs;
    let Some(session) = ctx.session.as_mut() else {
        return Some(StateId::Idle);
    };

    if session.envelope.fading(elapsed) {
        return apply_fade(ctx).or(Some(StateId::FadingOut));
    }

    if let EnvelopeStep::Volume(v) = session.envelope.step(elapsed) {
        set_volume(session, &mut ctx.commands, v);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FADING_OUT state: one volume unit per second until silence
// ═══════════════════════════════════════════════════════════════════════════

fn fading_update(ctx: &mut PlaybackContext) -> Option<StateId> {
    if !ctx.engine.running {
        ctx.stop_reason = Some(StopReason::EndOfStream);
        return Some(StateId::Idle);
    }
    apply_fade(ctx)
}

/// Apply the fade-out step.  Volume never rises once the fade began, even
/// if the engine clock jumps backwards.
fn apply_fade(ctx: &mut PlaybackContext) -> Option<StateId> {
    let elapsed = ctx.engine.elapsed_secs;
    let Some(session) = ctx.session.as_mut() else {
        return Some(StateId::Idle);
    };

    match session.envelope.step(elapsed) {
        EnvelopeStep::Stop => {
            info!("FADING_OUT: silence reached at {}s", elapsed);
            ctx.stop_reason = Some(StopReason::FadeComplete);
            Some(StateId::Idle)
        }
        EnvelopeStep::Volume(v) => {
            let v = session.fade_floor.map_or(v, |floor| v.min(floor));
            session.fade_floor = Some(v);
            set_volume(session, &mut ctx.commands, v);
            None
        }
    }
}
