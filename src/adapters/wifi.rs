//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary for the wireless link.
//! `begin` validates the credentials, configures the station and starts
//! the join without waiting; the network session polls `is_connected`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi::EspWifi`.
//! - **all other targets**: simulation for host-side tests.

use core::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{LinkError, LinkPort, MacAddress};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() {
        return Err(LinkError::NoCredentials);
    }
    if ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiAdapter {
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    mac: MacAddress,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: esp_idf_svc::wifi::EspWifi<'static>) -> Self {
        let mac = wifi
            .sta_netif()
            .get_mac()
            .unwrap_or_else(|_| super::device_id::read_mac());
        Self { wifi, mac }
    }
}

#[cfg(target_os = "espidf")]
impl LinkPort for WifiAdapter {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        validate_ssid(ssid)?;
        validate_password(password)?;

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::InvalidSsid)?,
            password: password.try_into().map_err(|_| LinkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        // A stale association blocks a fresh join.
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect before join failed: {}", e);
        }
        self.wifi
            .set_configuration(&config)
            .map_err(|e| LinkError::Driver(e.code()))?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| LinkError::Driver(e.code()))?;
        }
        self.wifi.connect().map_err(|e| LinkError::Driver(e.code()))?;
        info!("WiFi: join started for '{}'", ssid);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        match self.wifi.sta_netif().get_ip_info() {
            Ok(info) if !info.ip.is_unspecified() => Some(info.ip),
            Ok(_) => None,
            Err(e) => {
                warn!("WiFi: ip info unavailable: {}", e);
                None
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Host simulation: the link comes up after a fixed number of status
/// polls and can be dropped on demand.
#[cfg(not(target_os = "espidf"))]
pub struct WifiAdapter {
    ssid: heapless::String<32>,
    mac: MacAddress,
    polls_to_join: u32,
    polls: core::cell::Cell<u32>,
    joining: bool,
    joins: u32,
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new(polls_to_join: u32) -> Self {
        Self {
            ssid: heapless::String::new(),
            mac: super::device_id::read_mac(),
            polls_to_join,
            polls: core::cell::Cell::new(0),
            joining: false,
            joins: 0,
        }
    }

    /// Simulate losing the access point.
    pub fn drop_link(&mut self) {
        warn!("WiFi(sim): link dropped");
        self.joining = false;
        self.polls.set(0);
    }

    /// Join attempts started so far.
    pub fn joins(&self) -> u32 {
        self.joins
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinkPort for WifiAdapter {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| LinkError::InvalidSsid)?;
        self.joining = true;
        self.joins += 1;
        self.polls.set(0);
        info!("WiFi(sim): joining '{}'", self.ssid);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if !self.joining {
            return false;
        }
        let n = self.polls.get();
        if n < self.polls_to_join {
            self.polls.set(n + 1);
            return false;
        }
        true
    }

    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.is_connected().then_some(Ipv4Addr::new(192, 168, 88, 40))
    }
}
