//! Runtime diagnostics.
//!
//! A `diagnose` command on the device topic publishes one JSON
//! [`DiagnosticReport`] to `diagnose/<device-id>`.  Heap figures come from
//! ESP-IDF on the device and are synthetic in simulation.

use core::net::Ipv4Addr;

use serde::Serialize;

use crate::app::commands::SessionKind;
use crate::fsm::StateId;

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Heap usage at the time of the report.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct HeapMetrics {
    pub free: u32,
    pub min_free: u32,
}

impl HeapMetrics {
    #[cfg(target_os = "espidf")]
    pub fn collect(_uptime_secs: u64) -> Self {
        use esp_idf_svc::sys::*;
        let free = unsafe { esp_get_free_heap_size() };
        let min_free = unsafe { esp_get_minimum_free_heap_size() };
        Self { free, min_free }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn collect(uptime_secs: u64) -> Self {
        // Slow decay so long-running simulations see the numbers move.
        let base_free: u32 = 180_224;
        let decay = (uptime_secs / 60) as u32 * 256;
        let free = base_free.saturating_sub(decay);
        Self {
            free,
            min_free: free - free / 8,
        }
    }
}

/// Playback part of the report.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlaybackReport {
    pub state: &'static str,
    pub kind: Option<&'static str>,
    pub url: Option<String>,
    pub volume: Option<u8>,
    pub elapsed_secs: u32,
}

impl PlaybackReport {
    pub fn new(
        state: StateId,
        session: Option<(SessionKind, &str, u8)>,
        elapsed_secs: u32,
    ) -> Self {
        Self {
            state: state_name(state),
            kind: session.map(|(kind, _, _)| kind_name(kind)),
            url: session.map(|(_, url, _)| url.to_owned()),
            volume: session.map(|(_, _, volume)| volume),
            elapsed_secs,
        }
    }
}

/// Payload published in reply to `diagnose`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub device_id: String,
    pub firmware: &'static str,
    pub uptime_secs: u64,
    pub ip: Option<String>,
    pub link_up: bool,
    pub broker_connected: bool,
    pub broker_state: i32,
    pub broker_sessions: u32,
    /// Uptime when the last link or broker recovery began.
    pub last_reconnect_ms: Option<u64>,
    pub heap: HeapMetrics,
    pub playback: PlaybackReport,
}

impl DiagnosticReport {
    pub fn ip_string(ip: Option<Ipv4Addr>) -> Option<String> {
        ip.map(|addr| addr.to_string())
    }

    /// Serialise to the JSON bytes that go on the wire.
    pub fn to_json(&self) -> Vec<u8> {
        // Only plain strings and integers: serialisation cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

fn state_name(state: StateId) -> &'static str {
    match state {
        StateId::Idle => "idle",
        StateId::Connecting => "connecting",
        StateId::Playing => "playing",
        StateId::FadingOut => "fading_out",
    }
}

fn kind_name(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Ringing => "ringing",
        SessionKind::Call => "call",
        SessionKind::Live => "live",
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Log the panic reason before the default handler resets the chip.
///
/// The serial log is the only operator console, so a panic that is not
/// logged here is invisible.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
