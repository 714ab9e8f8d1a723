//! Device configuration.
//!
//! An immutable snapshot built once at startup from the persisted
//! [`ConfigStore`] and passed by reference into every component.
//!
//! Persisted layout (section → keys):
//!
//! | Section  | Keys                                                          |
//! |----------|---------------------------------------------------------------|
//! | `WiFi`   | `ssid`, `password`                                            |
//! | `MQTT`   | `broker`, `port`, `username`, `password`, `topicRinging`,     |
//! |          | `topicSleep`, `topicAdvertiseUnit`, `topicControl`, `topicCall`|
//! | `URL`    | `song`                                                        |
//! | `Audio`  | `volume`, `fadeStart`, `fadeIn`, `fadeInStep`, `pinBclk`,     |
//! |          | `pinLrc`, `pinDout` (optional)                                |
//! | `Serial` | `baud` (optional)                                             |
//!
//! Missing string keys become empty strings; an empty topic disables its
//! route.  Missing numeric keys fall back to the defaults below.

use core::fmt;
use core::str::FromStr;

use log::warn;

use crate::app::ports::{ConfigStore, I2sPins};

/// Sections the store must contain.
pub const REQUIRED_SECTIONS: [&str; 3] = ["WiFi", "MQTT", "URL"];

/// Every key each known section may contain.  Anything else is a typo.
pub const KNOWN_KEYS: [(&str, &[&str]); 5] = [
    ("WiFi", &["ssid", "password"]),
    (
        "MQTT",
        &[
            "broker",
            "port",
            "username",
            "password",
            "topicRinging",
            "topicSleep",
            "topicAdvertiseUnit",
            "topicControl",
            "topicCall",
        ],
    ),
    ("URL", &["song"]),
    (
        "Audio",
        &["volume", "fadeStart", "fadeIn", "fadeInStep", "pinBclk", "pinLrc", "pinDout"],
    ),
    ("Serial", &["baud"]),
];

const DEFAULT_BROKER_PORT: u16 = 1883;
const DEFAULT_VOLUME: u8 = 25;
const DEFAULT_FADE_START_SECS: u32 = 20;
const DEFAULT_FADE_IN_STEP: u8 = 2;
const DEFAULT_PINS: I2sPins = I2sPins {
    bclk: 26,
    lrc: 25,
    dout: 22,
};
const DEFAULT_SERIAL_BAUD: u32 = 115_200;

const MAX_VOLUME: u8 = 100;
/// Highest ESP32 GPIO that can drive an output.  34 to 39 are input-only.
pub const MAX_OUTPUT_GPIO: u8 = 33;

// ───────────────────────────────────────────────────────────────
// Config structs
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_BROKER_PORT,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Topic names.  An empty name disables the corresponding route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicConfig {
    pub ringing: String,
    pub sleep: String,
    pub control: String,
    pub call: String,
    /// Publish-only: device identity is announced here.
    pub advertise: String,
}

/// Volume envelope parameters for shaped (ringing) sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeConfig {
    /// Steady volume, 0–100.
    pub target_volume: u8,
    /// Elapsed seconds at which the fade-out begins.
    pub fade_start_secs: u32,
    /// Ramp up from silence before `fade_start_secs`.
    pub fade_in: bool,
    /// Volume units gained per second during the fade-in.
    pub fade_in_step: u8,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            target_volume: DEFAULT_VOLUME,
            fade_start_secs: DEFAULT_FADE_START_SECS,
            fade_in: false,
            fade_in_step: DEFAULT_FADE_IN_STEP,
        }
    }
}

/// Retry cadence for the blocking recovery loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimings {
    /// Delay between link status polls while joining.
    pub link_poll_ms: u32,
    /// Emit a progress line every this many polls.
    pub link_progress_every: u32,
    /// Delay between broker connection attempts.
    pub broker_retry_ms: u32,
    /// Stream-open attempt bound.
    pub stream_open_attempts: u32,
    /// Delay before each stream-open attempt.
    pub stream_open_delay_ms: u32,
}

impl Default for RetryTimings {
    fn default() -> Self {
        Self {
            link_poll_ms: 500,
            link_progress_every: 100,
            broker_retry_ms: 2_000,
            stream_open_attempts: 10,
            stream_open_delay_ms: 10,
        }
    }
}

/// Complete device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub wifi: WifiConfig,
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    /// Prefix joined with a media identifier to form the stream URL.
    pub media_base_url: String,
    pub envelope: EnvelopeConfig,
    pub pins: I2sPins,
    pub serial_baud: u32,
    pub retry: RetryTimings,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            broker: BrokerConfig::default(),
            topics: TopicConfig::default(),
            media_base_url: String::new(),
            envelope: EnvelopeConfig::default(),
            pins: DEFAULT_PINS,
            serial_baud: DEFAULT_SERIAL_BAUD,
            retry: RetryTimings::default(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

/// A configuration value is missing, unparsable, or out of range.
/// The `&'static str` names the `Section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    MissingValue(&'static str),
    InvalidNumber(&'static str),
    OutOfRange(&'static str),
    /// Fade-in would not reach the target volume by the fade start.
    DiscontinuousEnvelope,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue(key) => write!(f, "missing value for {}", key),
            Self::InvalidNumber(key) => write!(f, "{} is not a number", key),
            Self::OutOfRange(key) => write!(f, "{} out of range", key),
            Self::DiscontinuousEnvelope => {
                write!(f, "Audio.fadeInStep x Audio.fadeStart must reach Audio.volume")
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Loading
// ───────────────────────────────────────────────────────────────

/// Parse an optional numeric key: empty → `default`.
fn number_or<T: FromStr>(
    store: &impl ConfigStore,
    section: &str,
    key: &str,
    label: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    let raw = store.get(section, key);
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    raw.parse().map_err(|_| ConfigError::InvalidNumber(label))
}

fn flag_or(
    store: &impl ConfigStore,
    section: &str,
    key: &str,
    label: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match store.get(section, key).trim() {
        "" => Ok(default),
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidNumber(label)),
    }
}

impl DeviceConfig {
    /// Build and validate the snapshot.
    pub fn from_store(store: &impl ConfigStore) -> Result<Self, ConfigError> {
        let cfg = Self {
            wifi: WifiConfig {
                ssid: store.get("WiFi", "ssid"),
                password: store.get("WiFi", "password"),
            },
            broker: BrokerConfig {
                host: store.get("MQTT", "broker"),
                port: number_or(store, "MQTT", "port", "MQTT.port", DEFAULT_BROKER_PORT)?,
                username: store.get("MQTT", "username"),
                password: store.get("MQTT", "password"),
            },
            topics: TopicConfig {
                ringing: store.get("MQTT", "topicRinging"),
                sleep: store.get("MQTT", "topicSleep"),
                control: store.get("MQTT", "topicControl"),
                call: store.get("MQTT", "topicCall"),
                advertise: store.get("MQTT", "topicAdvertiseUnit"),
            },
            media_base_url: store.get("URL", "song"),
            envelope: EnvelopeConfig {
                target_volume: number_or(store, "Audio", "volume", "Audio.volume", DEFAULT_VOLUME)?,
                fade_start_secs: number_or(
                    store,
                    "Audio",
                    "fadeStart",
                    "Audio.fadeStart",
                    DEFAULT_FADE_START_SECS,
                )?,
                fade_in: flag_or(store, "Audio", "fadeIn", "Audio.fadeIn", false)?,
                fade_in_step: number_or(
                    store,
                    "Audio",
                    "fadeInStep",
                    "Audio.fadeInStep",
                    DEFAULT_FADE_IN_STEP,
                )?,
            },
            pins: I2sPins {
                bclk: number_or(store, "Audio", "pinBclk", "Audio.pinBclk", DEFAULT_PINS.bclk)?,
                lrc: number_or(store, "Audio", "pinLrc", "Audio.pinLrc", DEFAULT_PINS.lrc)?,
                dout: number_or(store, "Audio", "pinDout", "Audio.pinDout", DEFAULT_PINS.dout)?,
            },
            serial_baud: number_or(store, "Serial", "baud", "Serial.baud", DEFAULT_SERIAL_BAUD)?,
            retry: RetryTimings::default(),
        };
        cfg.validate()?;
        cfg.warn_disabled_features();
        Ok(cfg)
    }

    /// Range and consistency checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi.ssid.is_empty() {
            return Err(ConfigError::MissingValue("WiFi.ssid"));
        }
        if self.broker.host.is_empty() {
            return Err(ConfigError::MissingValue("MQTT.broker"));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::OutOfRange("MQTT.port"));
        }
        if self.envelope.target_volume > MAX_VOLUME {
            return Err(ConfigError::OutOfRange("Audio.volume"));
        }
        for (pin, label) in [
            (self.pins.bclk, "Audio.pinBclk"),
            (self.pins.lrc, "Audio.pinLrc"),
            (self.pins.dout, "Audio.pinDout"),
        ] {
            if pin > MAX_OUTPUT_GPIO {
                return Err(ConfigError::OutOfRange(label));
            }
        }
        if self.envelope.fade_in {
            let reach =
                u64::from(self.envelope.fade_in_step) * u64::from(self.envelope.fade_start_secs);
            if reach < u64::from(self.envelope.target_volume) {
                return Err(ConfigError::DiscontinuousEnvelope);
            }
        }
        if self.serial_baud == 0 {
            return Err(ConfigError::OutOfRange("Serial.baud"));
        }
        Ok(())
    }

    fn warn_disabled_features(&self) {
        for (topic, label) in [
            (&self.topics.ringing, "ringing"),
            (&self.topics.sleep, "sleep"),
            (&self.topics.control, "control"),
            (&self.topics.call, "call"),
            (&self.topics.advertise, "advertise"),
        ] {
            if topic.is_empty() {
                warn!("Config: {} topic empty, feature disabled", label);
            }
        }
        if self.media_base_url.is_empty() {
            warn!("Config: URL.song empty, media identifiers are used as bare URLs");
        }
    }
}
