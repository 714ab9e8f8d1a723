//! Topic dispatcher: inbound (topic, payload) → [`Action`].
//!
//! The route table is built once from [`DeviceConfig`] and looked up by
//! exact topic equality:
//!
//! | Route     | Topic                      | Payload           | Action                   |
//! |-----------|----------------------------|-------------------|--------------------------|
//! | Control   | `MQTT.topicControl`        | `here`            | `AdvertiseIdentity`      |
//! | Sleep     | `MQTT.topicSleep`          | decimal minutes   | `Suspend`                |
//! | Ringing   | `MQTT.topicRinging`        | media identifier  | `Play` (shaped)          |
//! | Call      | `MQTT.topicCall`           | media identifier  | `Play` (constant volume) |
//! | Live      | `live`                     | full stream URL   | `Play` (constant volume) |
//! | Device    | device identity (MAC)      | `diagnose`        | `Diagnose`               |
//!
//! Empty topic names are skipped entirely.  If two routes share a topic the
//! earlier row wins and the topic is subscribed once.

use core::fmt;
use std::collections::HashMap;

use log::debug;

use crate::app::commands::{Action, SessionKind};
use crate::config::DeviceConfig;
use crate::power::{self, SuspendError};

/// Fixed topic for full-URL live streams.
pub const LIVE_TOPIC: &str = "live";
/// Control payload that requests an identity re-advertisement.
pub const IDENTITY_REQUEST: &str = "here";
/// Device-topic payload that requests a status report.
pub const DIAGNOSE_COMMAND: &str = "diagnose";

/// Which handler a topic feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Control,
    Sleep,
    Ringing,
    Call,
    Live,
    Device,
}

/// A routed payload that could not be turned into an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Play route with an empty media identifier or URL.
    EmptyMedia(Route),
    /// Device topic with a command other than `diagnose`.
    UnknownCommand,
    /// Sleep route with an unusable duration.
    Sleep(SuspendError),
    /// Payload bytes are not valid UTF-8.
    NotText,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMedia(route) => write!(f, "empty media payload on {:?} route", route),
            Self::UnknownCommand => write!(f, "unknown device command"),
            Self::Sleep(e) => write!(f, "{}", e),
            Self::NotText => write!(f, "payload is not UTF-8 text"),
        }
    }
}

/// View a transport payload as UTF-8 text.
///
/// The slice length is the transport-reported length; nothing past it is
/// read and no terminator is expected.  Media identifiers go into URLs
/// byte for byte, so invalid UTF-8 is refused rather than repaired.
pub fn decode_payload(payload: &[u8]) -> Result<&str, PayloadError> {
    core::str::from_utf8(payload).map_err(|_| PayloadError::NotText)
}

pub struct Dispatcher {
    /// Distinct subscribed topics, in route-table order.
    table: Vec<(String, Route)>,
    index: HashMap<String, Route>,
    media_base_url: String,
}

impl Dispatcher {
    /// Build the route table.  `device_id` is the device's own topic.
    pub fn from_config(config: &DeviceConfig, device_id: &str) -> Self {
        let candidates = [
            (config.topics.control.as_str(), Route::Control),
            (config.topics.sleep.as_str(), Route::Sleep),
            (config.topics.ringing.as_str(), Route::Ringing),
            (config.topics.call.as_str(), Route::Call),
            (LIVE_TOPIC, Route::Live),
            (device_id, Route::Device),
        ];

        let mut table = Vec::with_capacity(candidates.len());
        let mut index = HashMap::with_capacity(candidates.len());
        for (topic, route) in candidates {
            if topic.is_empty() {
                continue;
            }
            if index.contains_key(topic) {
                debug!("Dispatch: '{}' already routed, {:?} shadowed", topic, route);
                continue;
            }
            index.insert(topic.to_owned(), route);
            table.push((topic.to_owned(), route));
        }

        Self {
            table,
            index,
            media_base_url: config.media_base_url.clone(),
        }
    }

    /// Topics to subscribe to, each exactly once.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.table.iter().map(|(topic, _)| topic.as_str())
    }

    pub fn lookup(&self, topic: &str) -> Option<Route> {
        self.index.get(topic).copied()
    }

    /// Map one inbound message to an action.
    ///
    /// `Ok(None)` means the message is ignored: unknown topic, or a
    /// control payload other than `here`.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<Option<Action>, PayloadError> {
        let Some(route) = self.lookup(topic) else {
            return Ok(None);
        };
        let text = decode_payload(payload)?;

        match route {
            Route::Control => Ok((text == IDENTITY_REQUEST).then_some(Action::AdvertiseIdentity)),
            Route::Sleep => power::parse_minutes(text)
                .map(|minutes| Some(Action::Suspend { minutes }))
                .map_err(PayloadError::Sleep),
            Route::Ringing => self.media(route, SessionKind::Ringing, text),
            Route::Call => self.media(route, SessionKind::Call, text),
            Route::Live => {
                if text.is_empty() {
                    return Err(PayloadError::EmptyMedia(route));
                }
                Ok(Some(Action::Play {
                    kind: SessionKind::Live,
                    url: text.to_owned(),
                }))
            }
            Route::Device => {
                if text == DIAGNOSE_COMMAND {
                    Ok(Some(Action::Diagnose))
                } else {
                    Err(PayloadError::UnknownCommand)
                }
            }
        }
    }

    /// Base path + media identifier, concatenated verbatim.
    fn media(&self, route: Route, kind: SessionKind, id: &str) -> Result<Option<Action>, PayloadError> {
        if id.is_empty() {
            return Err(PayloadError::EmptyMedia(route));
        }
        let mut url = String::with_capacity(self.media_base_url.len() + id.len());
        url.push_str(&self.media_base_url);
        url.push_str(id);
        Ok(Some(Action::Play { kind, url }))
    }
}
