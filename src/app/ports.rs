//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (radio, broker client, audio engine, sleep controller,
//! configuration store) implement these traits.  The
//! [`Controller`](super::service::Controller) consumes them via generics,
//! so the domain core never touches hardware directly.
//!
//! ## Blocking contract
//!
//! Every port call is synchronous.  The firmware runs one cooperative loop
//! and the retry helpers in [`crate::retry`] block that loop on purpose;
//! adapters must not spawn work that calls back into the domain.

use core::net::Ipv4Addr;

use super::events::AppEvent;

/// Full 6-byte hardware (station) address.
pub type MacAddress = [u8; 6];

// ───────────────────────────────────────────────────────────────
// Configuration store port (driven adapter: flash file → domain)
// ───────────────────────────────────────────────────────────────

/// Section/key lookup over the persisted configuration file.
///
/// `get` never fails: an absent key, or a store that could not be opened
/// or validated, yields an empty string.  Callers that need to know
/// *why* a value is empty check [`status`](Self::status) once at startup.
pub trait ConfigStore {
    /// Result of opening and validating the backing file.
    fn status(&self) -> Result<(), ConfigStoreError>;

    /// Look up `key` in `section`.  Case- and spelling-sensitive.
    fn get(&self, section: &str, key: &str) -> String;
}

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: domain ↔ wireless radio)
// ───────────────────────────────────────────────────────────────

/// Station-mode wireless link.
pub trait LinkPort {
    /// Start joining `ssid`.  Returns once the join has been *initiated*;
    /// completion is observed through [`is_connected`](Self::is_connected).
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    /// Whether the link is associated and has an address.
    fn is_connected(&self) -> bool;

    /// Factory station MAC address.
    fn mac_address(&self) -> MacAddress;

    /// Address assigned by DHCP, if any.
    fn local_ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain ↔ publish/subscribe client)
// ───────────────────────────────────────────────────────────────

/// Where and as whom to connect.
#[derive(Debug, Clone, Copy)]
pub struct BrokerEndpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: &'a str,
    pub password: &'a str,
}

/// One message delivered by the broker.  The payload length is whatever
/// the transport reported; the domain trusts it as the iteration bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: &str, payload: &[u8]) -> Self {
        Self {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        }
    }
}

/// Publish/subscribe client transport.
pub trait BrokerPort {
    /// Open a session.  Subscriptions from an earlier session are gone
    /// after this returns; callers must re-subscribe.
    fn connect(&mut self, endpoint: &BrokerEndpoint<'_>, client_id: &str) -> Result<(), BrokerError>;

    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Service the transport and hand back the next buffered inbound
    /// message, if any.
    fn poll(&mut self) -> Option<InboundMessage>;

    /// Transport-specific state code for diagnostics (0 = connected).
    fn state_code(&self) -> i32;
}

// ───────────────────────────────────────────────────────────────
// Audio port (driven adapter: domain → decode/output engine)
// ───────────────────────────────────────────────────────────────

/// I2S pin assignment for the external amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2sPins {
    pub bclk: u8,
    pub lrc: u8,
    pub dout: u8,
}

/// Streaming audio engine.
pub trait AudioPort {
    /// Route output to the given pins.  Called once at startup.
    fn set_pinout(&mut self, pins: I2sPins) -> Result<(), AudioError>;

    /// Open a network stream.  Returns whether the engine accepted it;
    /// [`is_running`](Self::is_running) is the authoritative check.
    fn connect_to_host(&mut self, url: &str) -> bool;

    fn is_running(&self) -> bool;

    /// Seconds of audio played in the current stream.
    fn current_time_secs(&self) -> u32;

    /// Output volume, 0–100.
    fn set_volume(&mut self, volume: u8);

    /// Halt output and close the network stream.  Safe when idle.
    fn stop(&mut self);

    /// Advance decoding/output by one slice.  Called every loop iteration.
    fn service(&mut self);

    /// Next queued engine status report, if any.
    fn take_status(&mut self) -> Option<AudioStatus>;
}

/// Category of an audio engine status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStatusKind {
    Info,
    Id3Data,
    EofMp3,
    Station,
    StreamInfo,
    StreamTitle,
    Bitrate,
    Commercial,
    IcyUrl,
    LastHost,
    EofSpeech,
}

impl AudioStatusKind {
    /// Fixed-width log tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Info => "info       ",
            Self::Id3Data => "id3data    ",
            Self::EofMp3 => "eof_mp3    ",
            Self::Station => "station    ",
            Self::StreamInfo => "streaminfo ",
            Self::StreamTitle => "streamtitle",
            Self::Bitrate => "bitrate    ",
            Self::Commercial => "commercial ",
            Self::IcyUrl => "icyurl     ",
            Self::LastHost => "lasthost   ",
            Self::EofSpeech => "eof_speech ",
        }
    }
}

/// A status report from the audio engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStatus {
    pub kind: AudioStatusKind,
    pub text: String,
}

// ───────────────────────────────────────────────────────────────
// Power port (driven adapter: domain → sleep controller)
// ───────────────────────────────────────────────────────────────

/// Low-power control.
pub trait PowerPort {
    /// Arm the wake timer.
    fn enable_timer_wakeup(&mut self, duration_us: u64) -> Result<(), PowerError>;

    /// Enter deep sleep.  On hardware this never returns: the device
    /// resumes at the top of startup.  Simulations return so tests can
    /// observe the call.
    fn deep_sleep(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic uptime source.
pub trait ClockPort {
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (serial log, test recorder, …).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigStore::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStoreError {
    /// The backing file could not be opened or read.
    Unavailable,
    /// A line is neither a section header, a `key=value` pair, nor a comment.
    Malformed { line: usize },
    /// A section header appears twice.
    DuplicateSection { line: usize },
    /// A required section is absent.
    MissingSection(&'static str),
}

/// Errors from [`LinkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    /// SSID must be 1–32 printable ASCII bytes.
    InvalidSsid,
    /// Password must be empty (open network) or 8–64 bytes.
    InvalidPassword,
    /// The radio driver rejected the request.
    Driver(i32),
}

/// Errors from [`BrokerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Connection refused or timed out; carries the transport state code.
    ConnectFailed(i32),
    NotConnected,
    SubscribeFailed,
    PublishFailed,
}

/// Errors from [`AudioPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    InvalidPin(u8),
    Driver(i32),
}

/// Errors from [`PowerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    TimerRejected(i32),
}

impl core::fmt::Display for ConfigStoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "store unavailable"),
            Self::Malformed { line } => write!(f, "malformed line {}", line),
            Self::DuplicateSection { line } => write!(f, "duplicate section at line {}", line),
            Self::MissingSection(name) => write!(f, "missing section [{}]", name),
        }
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::Driver(code) => write!(f, "driver error {}", code),
        }
    }
}

impl core::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectFailed(state) => write!(f, "connect failed with state {}", state),
            Self::NotConnected => write!(f, "not connected"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
        }
    }
}

impl core::fmt::Display for AudioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "invalid I2S pin {}", pin),
            Self::Driver(code) => write!(f, "driver error {}", code),
        }
    }
}

impl core::fmt::Display for PowerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TimerRejected(code) => write!(f, "wake timer rejected ({})", code),
        }
    }
}
