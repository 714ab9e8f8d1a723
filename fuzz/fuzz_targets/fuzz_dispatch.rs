//! Fuzz target: inbound message routing
//!
//! Splits the input into a topic and a payload and routes it through a
//! dispatcher built from a fully-populated configuration, verifying:
//! - No panics for any topic or payload bytes
//! - `AdvertiseIdentity` only ever comes from `here` on the control topic
//! - A sleep action always carries a positive duration
//!
//! cargo fuzz run fuzz_dispatch

#![no_main]

use bellnode::app::commands::Action;
use bellnode::config::DeviceConfig;
use bellnode::dispatch::Dispatcher;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut cfg = DeviceConfig::default();
    cfg.topics.control = "control".to_owned();
    cfg.topics.sleep = "sleep".to_owned();
    cfg.topics.ringing = "zvonenie".to_owned();
    cfg.topics.call = "call".to_owned();
    cfg.media_base_url = "http://m/".to_owned();
    let dispatcher = Dispatcher::from_config(&cfg, "24:6F:28:AA:BB:0C");

    // First byte picks a known topic (or uses raw bytes as the topic).
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let topics = dispatcher.topics().map(str::to_owned).collect::<Vec<_>>();
    let (topic, payload) = match topics.get(selector as usize % (topics.len() + 1)) {
        Some(t) => (t.clone(), rest),
        None => {
            let split = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            (
                String::from_utf8_lossy(&rest[..split]).into_owned(),
                rest.get(split + 1..).unwrap_or(&[]),
            )
        }
    };

    match dispatcher.route(&topic, payload) {
        Ok(Some(Action::AdvertiseIdentity)) => {
            assert_eq!(topic, "control");
            assert_eq!(payload, b"here");
        }
        Ok(Some(Action::Suspend { minutes })) => assert!(minutes > 0),
        _ => {}
    }
});
