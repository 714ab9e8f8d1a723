//! Mock adapters for integration tests.
//!
//! Every port records what the controller asked of it so tests can assert
//! on the full call history without a radio, a broker, or an amplifier.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;

use bellnode::adapters::ini_store::IniStore;
use bellnode::app::events::AppEvent;
use bellnode::app::ports::{
    AudioError, AudioPort, AudioStatus, BrokerEndpoint, BrokerError, BrokerPort, ClockPort,
    EventSink, I2sPins, InboundMessage, LinkError, LinkPort, MacAddress, PowerError, PowerPort,
};
use bellnode::app::service::{Controller, Ports};
use bellnode::config::DeviceConfig;
use embedded_hal::delay::DelayNs;

pub const MAC: MacAddress = [0x24, 0x6F, 0x28, 0xAA, 0xBB, 0x0C];
pub const DEVICE_ID: &str = "24:6F:28:AA:BB:0C";
pub const MEDIA_BASE: &str = "http://192.168.88.252:80/zvonenie/";

/// A complete, valid configuration file.
pub const CONFIG_INI: &str = "\
[WiFi]
ssid=Siet_rozhlas
password=rozhlas123

[MQTT]
broker=192.168.88.251
port=1884
topicControl=control
topicSleep=sleep
topicRinging=zvonenie
topicCall=call
topicAdvertiseUnit=units

[URL]
song=http://192.168.88.252:80/zvonenie/

[Audio]
volume=25
fadeStart=20
";

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    pub joins: Vec<(String, String)>,
    /// Status polls that report "not yet" after each `begin`.
    pub polls_to_join: u32,
    polls: Cell<u32>,
    joined: Cell<bool>,
    joining: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            joins: Vec::new(),
            polls_to_join: 0,
            polls: Cell::new(0),
            joined: Cell::new(false),
            joining: false,
        }
    }

    pub fn drop_link(&mut self) {
        self.joining = false;
        self.joined.set(false);
    }
}

impl LinkPort for MockLink {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        if ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        self.joins.push((ssid.to_owned(), password.to_owned()));
        self.joining = true;
        self.polls.set(0);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if self.joined.get() {
            return true;
        }
        if !self.joining {
            return false;
        }
        let n = self.polls.get() + 1;
        self.polls.set(n);
        if n > self.polls_to_join {
            self.joined.set(true);
        }
        self.joined.get()
    }

    fn mac_address(&self) -> MacAddress {
        MAC
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.joined.get().then_some(Ipv4Addr::new(192, 168, 88, 40))
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    pub connected: bool,
    /// Connection attempts that fail before one succeeds.
    pub refuse_next: u32,
    /// Subscribe calls that fail on an otherwise healthy session.
    pub fail_subscribes: u32,
    /// Publish calls that fail on an otherwise healthy session.
    pub fail_publishes: u32,
    pub connects: u32,
    /// Every subscribe call, across all sessions.
    pub subscribed: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbox: VecDeque<InboundMessage>,
}

impl MockBroker {
    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        self.inbox.push_back(InboundMessage::new(topic, payload));
    }

    pub fn published_to(&self, topic: &str) -> Vec<&[u8]> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_slice())
            .collect()
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self, _endpoint: &BrokerEndpoint<'_>, _client_id: &str) -> Result<(), BrokerError> {
        self.connects += 1;
        if self.refuse_next > 0 {
            self.refuse_next -= 1;
            self.connected = false;
            return Err(BrokerError::ConnectFailed(-2));
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if self.fail_subscribes > 0 {
            self.fail_subscribes -= 1;
            return Err(BrokerError::SubscribeFailed);
        }
        self.subscribed.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if self.fail_publishes > 0 {
            self.fail_publishes -= 1;
            return Err(BrokerError::PublishFailed);
        }
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }

    fn state_code(&self) -> i32 {
        if self.connected { 0 } else { -1 }
    }
}

// ── Audio ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAudio {
    pub pins: Option<I2sPins>,
    pub running: bool,
    /// Open attempts that fail before one succeeds.
    pub fail_opens: u32,
    pub opens: Vec<String>,
    /// Every volume the controller applied, in order.
    pub volumes: Vec<u8>,
    pub stops: u32,
    pub services: u32,
    /// Engine-reported elapsed seconds; set by the test.
    pub elapsed: u32,
}

impl MockAudio {
    pub fn last_volume(&self) -> Option<u8> {
        self.volumes.last().copied()
    }
}

impl AudioPort for MockAudio {
    fn set_pinout(&mut self, pins: I2sPins) -> Result<(), AudioError> {
        self.pins = Some(pins);
        Ok(())
    }

    fn connect_to_host(&mut self, url: &str) -> bool {
        self.opens.push(url.to_owned());
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            self.running = false;
            return false;
        }
        self.running = true;
        self.elapsed = 0;
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn current_time_secs(&self) -> u32 {
        self.elapsed
    }

    fn set_volume(&mut self, volume: u8) {
        self.volumes.push(volume);
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.running = false;
    }

    fn service(&mut self) {
        self.services += 1;
    }

    fn take_status(&mut self) -> Option<AudioStatus> {
        None
    }
}

// ── Power ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPower {
    pub armed_us: Vec<u64>,
    pub sleeps: u32,
    pub reject: bool,
}

impl PowerPort for MockPower {
    fn enable_timer_wakeup(&mut self, duration_us: u64) -> Result<(), PowerError> {
        if self.reject {
            return Err(PowerError::TimerRejected(-1));
        }
        self.armed_us.push(duration_us);
        Ok(())
    }

    fn deep_sleep(&mut self) {
        self.sleeps += 1;
    }
}

// ── Time ──────────────────────────────────────────────────────

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct MockDelay {
    pub total_ns: u64,
    pub calls: u32,
}

impl MockDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_ns += u64::from(us) * 1_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

#[derive(Default)]
pub struct MockClock {
    pub now_ms: Cell<u64>,
}

impl ClockPort for MockClock {
    fn uptime_ms(&self) -> u64 {
        self.now_ms.get()
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Assembly ──────────────────────────────────────────────────

pub type TestController =
    Controller<MockLink, MockBroker, MockAudio, MockPower, MockDelay, MockClock>;

pub fn ports() -> Ports<MockLink, MockBroker, MockAudio, MockPower, MockDelay, MockClock> {
    Ports {
        link: MockLink::new(),
        broker: MockBroker::default(),
        audio: MockAudio::default(),
        power: MockPower::default(),
        delay: MockDelay::default(),
        clock: MockClock::default(),
    }
}

pub fn config() -> DeviceConfig {
    let store = IniStore::parse(CONFIG_INI);
    match DeviceConfig::from_store(&store) {
        Ok(cfg) => cfg,
        Err(e) => panic!("test config invalid: {e}"),
    }
}

/// A controller that has completed startup against [`CONFIG_INI`].
pub fn started() -> (TestController, RecordingSink) {
    let mut sink = RecordingSink::new();
    let store = IniStore::parse(CONFIG_INI);
    let controller = match TestController::startup(&store, ports(), &mut sink) {
        Ok(c) => c,
        Err(e) => panic!("startup failed: {e}"),
    };
    (controller, sink)
}
