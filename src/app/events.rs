//! Outbound application events.
//!
//! The controller emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder).

use core::net::Ipv4Addr;

use super::commands::SessionKind;
use crate::fsm::StateId;

/// Why a playback session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The fade-out envelope reached silence.
    FadeComplete,
    /// The engine stopped on its own (end of stream or stream error).
    EndOfStream,
    /// A new play request replaced the session.
    Replaced,
    /// The device is about to suspend.
    Suspend,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Controller finished startup.
    Started { device_id: String },

    /// Wireless link came up.
    LinkUp { ip: Option<Ipv4Addr>, polls: u32 },

    /// Wireless link was found down during the health check.
    LinkLost,

    /// Broker session established (subscriptions restored).
    BrokerConnected { attempts: u32, subscriptions: usize },

    /// Broker session was found down during the health check.
    BrokerLost,

    /// The playback FSM moved.
    StateChanged { from: StateId, to: StateId },

    /// A stream opened and is running.
    PlaybackStarted { kind: SessionKind, attempts: u32 },

    /// Stream open gave up after the retry bound.
    PlaybackAborted { attempts: u32 },

    /// Output volume changed during a session.
    VolumeChanged { volume: u8, elapsed_secs: u32 },

    /// A playback session ended.
    PlaybackStopped(StopReason),

    /// Identity was published to the advertise topic.
    IdentityPublished,

    /// Status payload was published to the diagnose topic.
    DiagnosticsPublished,

    /// A sleep command was accepted; the device suspends next.
    SuspendScheduled { minutes: u64 },

    /// A sleep command was rejected.
    SuspendRejected,

    /// An inbound topic matched no route (or an unknown device command).
    MessageIgnored,
}
