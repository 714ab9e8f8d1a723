//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`].  The ESP-IDF client delivers events on its
//! own task; the callback only pushes into a shared [`Inbox`] which the
//! cooperative loop drains through [`BrokerPort::poll`], so dispatch
//! always runs on the main loop.
//!
//! State codes follow the classic Arduino client convention:
//!
//! | Code | Meaning               |
//! |------|-----------------------|
//! | `0`  | connected             |
//! | `-1` | disconnected          |
//! | `-2` | connect failed        |
//! | `-4` | connection timed out  |
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: scriptable in-memory broker for host tests.

use std::collections::VecDeque;

use log::warn;

use crate::app::ports::{BrokerEndpoint, BrokerError, BrokerPort, InboundMessage};

pub const STATE_CONNECTED: i32 = 0;
pub const STATE_DISCONNECTED: i32 = -1;
pub const STATE_CONNECT_FAILED: i32 = -2;
pub const STATE_CONNECTION_TIMEOUT: i32 = -4;

/// Inbound messages buffered beyond this are dropped, oldest first.
const INBOX_CAPACITY: usize = 16;

/// Messages and session state shared with the client's event task.
#[derive(Debug)]
pub struct Inbox {
    queue: VecDeque<InboundMessage>,
    connected: bool,
    state: i32,
}

impl Default for Inbox {
    fn default() -> Self {
        Self {
            queue: VecDeque::with_capacity(INBOX_CAPACITY),
            connected: false,
            state: STATE_DISCONNECTED,
        }
    }
}

impl Inbox {
    pub fn push(&mut self, msg: InboundMessage) {
        if self.queue.len() >= INBOX_CAPACITY {
            warn!("MQTT: inbox full, dropping message on '{}'", msg.topic);
            self.queue.pop_front();
        }
        self.queue.push_back(msg);
    }

    pub fn pop(&mut self) -> Option<InboundMessage> {
        self.queue.pop_front()
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        self.state = if connected {
            STATE_CONNECTED
        } else {
            STATE_DISCONNECTED
        };
    }

    pub fn set_state(&mut self, state: i32) {
        self.connected = state == STATE_CONNECTED;
        self.state = state;
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn state(&self) -> i32 {
        self.state
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use embedded_svc::mqtt::client::{Details, EventPayload, QoS};
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration};
    use log::{debug, info, warn};

    use super::{Inbox, STATE_CONNECT_FAILED, STATE_CONNECTION_TIMEOUT};
    use crate::app::ports::{BrokerEndpoint, BrokerError, BrokerPort, InboundMessage};

    /// How long `connect` waits for the CONNACK.
    const CONNECT_TIMEOUT_MS: u32 = 5_000;
    const CONNECT_POLL_MS: u32 = 50;

    pub struct MqttAdapter {
        client: Option<EspMqttClient<'static>>,
        inbox: Arc<Mutex<Inbox>>,
    }

    impl Default for MqttAdapter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MqttAdapter {
        pub fn new() -> Self {
            Self {
                client: None,
                inbox: Arc::new(Mutex::new(Inbox::default())),
            }
        }

        fn with_inbox<R>(&self, f: impl FnOnce(&mut Inbox) -> R) -> Option<R> {
            self.inbox.lock().ok().map(|mut inbox| f(&mut inbox))
        }
    }

    impl BrokerPort for MqttAdapter {
        fn connect(&mut self, endpoint: &BrokerEndpoint<'_>, client_id: &str) -> Result<(), BrokerError> {
            // The old session (and its subscriptions) is discarded.
            self.client = None;
            self.with_inbox(|inbox| inbox.set_connected(false));

            let url = format!("mqtt://{}:{}", endpoint.host, endpoint.port);
            let conf = MqttClientConfiguration {
                client_id: Some(client_id),
                username: (!endpoint.username.is_empty()).then_some(endpoint.username),
                password: (!endpoint.password.is_empty()).then_some(endpoint.password),
                reconnect_timeout: Some(Duration::from_secs(3_600)),
                ..Default::default()
            };

            let inbox = Arc::clone(&self.inbox);
            let client = EspMqttClient::new_cb(&url, &conf, move |event| {
                let Ok(mut inbox) = inbox.lock() else {
                    return;
                };
                match event.payload() {
                    EventPayload::Connected(_) => inbox.set_connected(true),
                    EventPayload::Disconnected => inbox.set_connected(false),
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => inbox.push(InboundMessage::new(topic, data)),
                    EventPayload::Received { .. } => {
                        debug!("MQTT: fragmented message dropped");
                    }
                    EventPayload::Error(e) => {
                        warn!("MQTT: transport error {:?}", e);
                        inbox.set_state(STATE_CONNECT_FAILED);
                    }
                    _ => {}
                }
            })
            .map_err(|e| BrokerError::ConnectFailed(e.code()))?;
            self.client = Some(client);

            let mut waited = 0;
            while waited < CONNECT_TIMEOUT_MS {
                if self.with_inbox(|inbox| inbox.connected()).unwrap_or(false) {
                    info!("MQTT: connected to {}", url);
                    return Ok(());
                }
                FreeRtos::delay_ms(CONNECT_POLL_MS);
                waited += CONNECT_POLL_MS;
            }

            self.client = None;
            let state = self
                .with_inbox(|inbox| {
                    if inbox.state() != STATE_CONNECT_FAILED {
                        inbox.set_state(STATE_CONNECTION_TIMEOUT);
                    }
                    inbox.state()
                })
                .unwrap_or(STATE_CONNECT_FAILED);
            Err(BrokerError::ConnectFailed(state))
        }

        fn is_connected(&self) -> bool {
            self.client.is_some() && self.with_inbox(|inbox| inbox.connected()).unwrap_or(false)
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
            let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
            client
                .subscribe(topic, QoS::AtMostOnce)
                .map(|_| ())
                .map_err(|_| BrokerError::SubscribeFailed)
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
            client
                .publish(topic, QoS::AtMostOnce, false, payload)
                .map(|_| ())
                .map_err(|_| BrokerError::PublishFailed)
        }

        fn poll(&mut self) -> Option<InboundMessage> {
            self.with_inbox(Inbox::pop).flatten()
        }

        fn state_code(&self) -> i32 {
            self.with_inbox(|inbox| inbox.state())
                .unwrap_or(STATE_CONNECT_FAILED)
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::MqttAdapter;

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Host simulation: records subscriptions and publications; inbound
/// messages are injected by the test.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct MqttAdapter {
    inbox: Inbox,
    /// Connection attempts that fail before one succeeds.
    pub refuse_next: u32,
    pub connects: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message as if the broker had delivered it.
    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        self.inbox.push(InboundMessage::new(topic, payload));
    }

    /// Simulate the broker closing the session.
    pub fn drop_session(&mut self) {
        warn!("MQTT(sim): session dropped");
        self.inbox.set_connected(false);
        self.subscriptions.clear();
    }
}

#[cfg(not(target_os = "espidf"))]
impl BrokerPort for MqttAdapter {
    fn connect(&mut self, _endpoint: &BrokerEndpoint<'_>, _client_id: &str) -> Result<(), BrokerError> {
        self.connects += 1;
        self.subscriptions.clear();
        if self.refuse_next > 0 {
            self.refuse_next -= 1;
            self.inbox.set_state(STATE_CONNECT_FAILED);
            return Err(BrokerError::ConnectFailed(STATE_CONNECT_FAILED));
        }
        self.inbox.set_connected(true);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inbox.connected()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.inbox.connected() {
            return Err(BrokerError::NotConnected);
        }
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.inbox.connected() {
            return Err(BrokerError::NotConnected);
        }
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.inbox.pop()
    }

    fn state_code(&self) -> i32 {
        self.inbox.state()
    }
}
