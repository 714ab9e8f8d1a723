//! Bellnode Firmware: Main Entry Point
//!
//! Networked bell / announcement endpoint: joins WiFi, holds an MQTT
//! session, and plays HTTP audio streams on command.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter   MqttAdapter   I2sAudio   DeepSleepAdapter       │
//! │  (LinkPort)    (BrokerPort)  (AudioPort) (PowerPort)           │
//! │  IniStore      LogEventSink  Esp32TimeAdapter   LoopDelay      │
//! │  (ConfigStore) (EventSink)   (ClockPort)        (DelayNs)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  NetworkSession · Dispatcher · Playback FSM · Power    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;
use log::{error, info, warn};

use bellnode::adapters::audio::I2sAudio;
use bellnode::adapters::ini_store::{self, CONFIG_PATH, IniStore};
use bellnode::adapters::log_sink::LogEventSink;
use bellnode::adapters::mqtt::MqttAdapter;
use bellnode::adapters::sleep::DeepSleepAdapter;
use bellnode::adapters::time::{Esp32TimeAdapter, LoopDelay};
use bellnode::adapters::wifi::WifiAdapter;
use bellnode::app::service::{Controller, Ports};
use bellnode::diagnostics::{self, FIRMWARE_VERSION};

/// Back-off between log lines while halted on a fatal startup error.
const HALT_LOG_INTERVAL_MS: u32 = 10_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    diagnostics::install_panic_handler();

    info!("╔══════════════════════════════════════╗");
    info!("║  Bellnode v{:<26}║", FIRMWARE_VERSION);
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration file ─────────────────────────────────
    if let Err(e) = ini_store::mount_spiffs() {
        warn!("SPIFFS unavailable ({}), config load will fail", e);
    }
    let store = IniStore::load(CONFIG_PATH);

    // ── 3. Peripherals and drivers ────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;

    let ports = Ports {
        link: WifiAdapter::new(wifi),
        broker: MqttAdapter::new(),
        audio: I2sAudio::new(),
        power: DeepSleepAdapter::new(),
        delay: LoopDelay,
        clock: Esp32TimeAdapter::new(),
    };
    let mut sink = LogEventSink::new();

    // ── 4. Startup (blocks until WiFi and broker are up) ──────
    let mut controller = match Controller::startup(&store, ports, &mut sink) {
        Ok(c) => c,
        Err(e) => {
            // No usable identity or network: stay put and keep saying so.
            loop {
                error!("Startup failed: {}. Fix {} and reset.", e, CONFIG_PATH);
                FreeRtos::delay_ms(HALT_LOG_INTERVAL_MS);
            }
        }
    };
    info!(
        "System ready (serial {} baud). Entering main loop.",
        controller.config().serial_baud
    );

    // ── 5. Cooperative loop ───────────────────────────────────
    loop {
        controller.iterate(&mut sink);
    }
}
