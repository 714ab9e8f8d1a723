//! Device identity derived from the ESP32 factory MAC address.
//!
//! The identity is the full station MAC in colon-separated uppercase hex
//! (`24:6F:28:AA:BB:CC`).  It is:
//! - Published to the advertise topic on every broker (re)connect
//! - The device's own command topic
//! - The suffix of the broker client id (`esp32-client-<MAC>`)
//! - The suffix of the diagnose topic (`diagnose/<MAC>`)

use core::fmt::Write;

use crate::app::ports::MacAddress;

/// "AA:BB:CC:DD:EE:FF" is 17 chars.
pub type DeviceIdString = heapless::String<17>;

const CLIENT_ID_PREFIX: &str = "esp32-client-";
const DIAGNOSE_PREFIX: &str = "diagnose/";

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x24, 0x6F, 0x28, 0xCA, 0xFE, 0x01]
}

/// Colon-separated uppercase MAC.
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(
        id,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    id
}

/// Broker client identifier, unique per device.
pub fn client_id(mac: &MacAddress) -> String {
    format!("{}{}", CLIENT_ID_PREFIX, device_id(mac))
}

/// Topic the diagnose report is published to.
pub fn diagnose_topic(mac: &MacAddress) -> String {
    format!("{}{}", DIAGNOSE_PREFIX, device_id(mac))
}
