//! Network session: keeps the wireless link and the broker session alive.
//!
//! ```text
//!  service() ──▶ link down? ──▶ ensure_link_up()        (poll forever, 500 ms)
//!            └─▶ broker down? ─▶ ensure_broker_connected() (retry forever, 2 s)
//!                                   └─▶ restore_session() (identity + every topic)
//! ```
//!
//! Both recovery paths block the cooperative loop until they succeed.
//! A new broker session starts with no subscriptions, so every successful
//! connect re-runs the full subscription sequence.  A connect whose
//! subscriptions fail part way is treated like a refused connect.

use core::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::adapters::device_id::{self, DeviceIdString};
use crate::app::events::AppEvent;
use crate::app::ports::{
    BrokerEndpoint, BrokerError, BrokerPort, ClockPort, EventSink, InboundMessage, LinkError,
    LinkPort, MacAddress,
};
use crate::config::{BrokerConfig, DeviceConfig, WifiConfig};
use crate::error::Result;
use crate::retry::RetryPolicy;

pub struct NetworkSession<L: LinkPort, B: BrokerPort> {
    link: L,
    broker: B,

    wifi: WifiConfig,
    endpoint: BrokerConfig,
    advertise_topic: String,
    subscriptions: Vec<String>,

    link_policy: RetryPolicy,
    broker_policy: RetryPolicy,
    link_progress_every: u32,

    mac: MacAddress,
    device_id: DeviceIdString,
    client_id: String,

    link_up: bool,
    broker_connected: bool,
    last_reconnect_ms: Option<u64>,
    broker_sessions: u32,
}

impl<L: LinkPort, B: BrokerPort> NetworkSession<L, B> {
    /// Take ownership of the link and broker ports.  The identity comes
    /// from the link's hardware address.
    pub fn new(link: L, broker: B, config: &DeviceConfig) -> Self {
        let mac = link.mac_address();
        Self {
            link,
            broker,
            wifi: config.wifi.clone(),
            endpoint: config.broker.clone(),
            advertise_topic: config.topics.advertise.clone(),
            subscriptions: Vec::new(),
            link_policy: RetryPolicy::unbounded(config.retry.link_poll_ms),
            broker_policy: RetryPolicy::unbounded(config.retry.broker_retry_ms),
            link_progress_every: config.retry.link_progress_every.max(1),
            mac,
            device_id: device_id::device_id(&mac),
            client_id: device_id::client_id(&mac),
            link_up: false,
            broker_connected: false,
            last_reconnect_ms: None,
            broker_sessions: 0,
        }
    }

    /// Topics restored on every broker session.  Empty names are dropped
    /// and each distinct topic is kept once.
    pub fn set_subscriptions<'a>(&mut self, topics: impl IntoIterator<Item = &'a str>) {
        self.subscriptions.clear();
        for topic in topics {
            if !topic.is_empty() && !self.subscriptions.iter().any(|t| t == topic) {
                self.subscriptions.push(topic.to_owned());
            }
        }
    }

    // ── Health check ──────────────────────────────────────────

    /// Detect loss and recover.  Called once per loop iteration before the
    /// transport is serviced; blocks until both link and broker are up.
    pub fn service(
        &mut self,
        delay: &mut impl DelayNs,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if !self.link.is_connected() {
            if self.link_up {
                warn!("NET: link lost");
                sink.emit(&AppEvent::LinkLost);
            }
            self.link_up = false;
            self.broker_connected = false;
            self.ensure_link_up(delay, clock, sink)?;
        }

        if !self.broker_connected || !self.broker.is_connected() {
            if self.broker_connected {
                warn!("NET: broker session lost (state {})", self.broker.state_code());
                sink.emit(&AppEvent::BrokerLost);
            }
            self.broker_connected = false;
            self.ensure_broker_connected(delay, clock, sink);
        }
        Ok(())
    }

    // ── Link ──────────────────────────────────────────────────

    /// Join the configured network and wait until the link reports
    /// connected.  Polls forever; only invalid credentials return early.
    pub fn ensure_link_up(
        &mut self,
        delay: &mut impl DelayNs,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> core::result::Result<(), LinkError> {
        if self.link.is_connected() {
            self.link_up = true;
            return Ok(());
        }

        self.last_reconnect_ms = Some(clock.uptime_ms());
        info!("NET: joining '{}'", self.wifi.ssid);
        self.link.begin(&self.wifi.ssid, &self.wifi.password)?;

        let every = self.link_progress_every;
        let ssid = self.wifi.ssid.as_str();
        let link = &self.link;
        let outcome = self.link_policy.run(delay, |n| {
            if link.is_connected() {
                return true;
            }
            if n % every == 0 {
                info!("NET: still joining '{}' ({} polls)", ssid, n);
            }
            false
        });

        self.link_up = true;
        let ip = self.link.local_ip();
        match ip {
            Some(addr) => info!("NET: WiFi connected, IP address {}", addr),
            None => info!("NET: WiFi connected, no address yet"),
        }
        sink.emit(&AppEvent::LinkUp {
            ip,
            polls: outcome.attempts(),
        });
        Ok(())
    }

    // ── Broker ────────────────────────────────────────────────

    /// Connect to the broker and restore identity and subscriptions,
    /// retrying forever.  A session that connects but cannot be fully
    /// restored counts as a failed attempt; the next `connect` replaces it.
    pub fn ensure_broker_connected(
        &mut self,
        delay: &mut impl DelayNs,
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        if self.broker.is_connected() && self.broker_connected {
            return;
        }

        self.broker_connected = false;
        self.last_reconnect_ms = Some(clock.uptime_ms());
        let endpoint = BrokerEndpoint {
            host: &self.endpoint.host,
            port: self.endpoint.port,
            username: &self.endpoint.username,
            password: &self.endpoint.password,
        };
        let client_id = self.client_id.as_str();
        let advertise = self.advertise_topic.as_str();
        let identity = self.device_id.as_bytes();
        let topics = self.subscriptions.as_slice();
        let retry_ms = self.broker_policy.delay_ms();
        let broker = &mut self.broker;

        info!(
            "NET: client {} connecting to {}:{}",
            client_id, endpoint.host, endpoint.port
        );
        let outcome = self.broker_policy.run(delay, |_| {
            let restored = match broker.connect(&endpoint, client_id) {
                Ok(()) => restore_session(&mut *broker, advertise, identity, topics, &mut *sink),
                Err(e) => Err(e),
            };
            match restored {
                Ok(()) => true,
                Err(e) => {
                    warn!("NET: {}, retrying in {} ms", e, retry_ms);
                    false
                }
            }
        });

        self.broker_sessions += 1;
        self.broker_connected = true;
        info!("NET: broker connected after {} attempt(s)", outcome.attempts());
        sink.emit(&AppEvent::BrokerConnected {
            attempts: outcome.attempts(),
            subscriptions: self.subscriptions.len(),
        });
    }

    // ── Publishing ────────────────────────────────────────────

    /// Announce the device identity on the advertise topic.  No-op when the
    /// advertise topic is not configured.
    pub fn publish_identity(&mut self, sink: &mut impl EventSink) -> core::result::Result<(), BrokerError> {
        announce(&mut self.broker, &self.advertise_topic, self.device_id.as_bytes(), sink)
    }

    /// Publish a status payload to `diagnose/<device-id>`.
    pub fn publish_diagnostics(
        &mut self,
        payload: &[u8],
        sink: &mut impl EventSink,
    ) -> core::result::Result<(), BrokerError> {
        let topic = device_id::diagnose_topic(&self.mac);
        self.broker.publish(&topic, payload)?;
        sink.emit(&AppEvent::DiagnosticsPublished);
        Ok(())
    }

    /// Next buffered inbound message.
    pub fn poll(&mut self) -> Option<InboundMessage> {
        self.broker.poll()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    pub fn broker_connected(&self) -> bool {
        self.broker_connected
    }

    pub fn device_id(&self) -> &str {
        self.device_id.as_str()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        self.link.local_ip()
    }

    pub fn broker_state(&self) -> i32 {
        self.broker.state_code()
    }

    /// Uptime at the start of the most recent recovery.
    pub fn last_reconnect_ms(&self) -> Option<u64> {
        self.last_reconnect_ms
    }

    /// Broker sessions established since boot.
    pub fn broker_sessions(&self) -> u32 {
        self.broker_sessions
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }
}

fn announce<B: BrokerPort>(
    broker: &mut B,
    topic: &str,
    identity: &[u8],
    sink: &mut impl EventSink,
) -> core::result::Result<(), BrokerError> {
    if topic.is_empty() {
        debug!("NET: no advertise topic, identity not published");
        return Ok(());
    }
    broker.publish(topic, identity)?;
    sink.emit(&AppEvent::IdentityPublished);
    Ok(())
}

/// Publish identity, then subscribe to every topic once.
fn restore_session<B: BrokerPort>(
    broker: &mut B,
    advertise: &str,
    identity: &[u8],
    topics: &[String],
    sink: &mut impl EventSink,
) -> core::result::Result<(), BrokerError> {
    announce(broker, advertise, identity, sink)?;
    for topic in topics {
        broker.subscribe(topic)?;
        debug!("NET: subscribed '{}'", topic);
    }
    Ok(())
}
