//! Fuzz target: INI configuration parser
//!
//! Feeds arbitrary text to `IniStore::parse` and verifies:
//! - No panics on malformed input
//! - A store whose status is an error answers every lookup with ""
//! - `DeviceConfig::from_store` never panics on whatever was parsed
//!
//! cargo fuzz run fuzz_ini_parser

#![no_main]

use bellnode::adapters::ini_store::IniStore;
use bellnode::app::ports::ConfigStore;
use bellnode::config::DeviceConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let store = IniStore::parse(&text);

    if store.status().is_err() {
        for (section, key) in [("WiFi", "ssid"), ("MQTT", "broker"), ("URL", "song")] {
            assert!(store.get(section, key).is_empty());
        }
    }

    let _ = DeviceConfig::from_store(&store);
});
