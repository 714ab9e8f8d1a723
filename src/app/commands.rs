//! Actions produced by routing an inbound message.
//!
//! The [`Dispatcher`](crate::dispatch::Dispatcher) turns a (topic, payload)
//! pair into one of these; the [`Controller`](super::service::Controller)
//! interprets it and drives the playback or power controller.

/// How a playback session shapes its volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Bell / announcement: fade-out envelope (and fade-in when enabled).
    Ringing,
    /// Call: constant volume for the whole stream.
    Call,
    /// Live stream from a full URL: constant volume.
    Live,
}

impl SessionKind {
    /// Whether the time-based envelope applies to this session.
    pub fn shaped(self) -> bool {
        matches!(self, Self::Ringing)
    }
}

/// Commands the dispatcher hands to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Re-publish the device identity to the advertise topic.
    AdvertiseIdentity,

    /// Suspend for the given number of minutes (already validated > 0).
    Suspend { minutes: i64 },

    /// Open `url` as a new playback session.
    Play { kind: SessionKind, url: String },

    /// Publish a status payload to `diagnose/<device-identity>`.
    Diagnose,
}
