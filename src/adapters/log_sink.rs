//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production), one
//! fixed-prefix line per event.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { device_id } => {
                info!("START | device={}", device_id);
            }
            AppEvent::LinkUp { ip, polls } => match ip {
                Some(ip) => info!("NET | link up, ip={} after {} polls", ip, polls),
                None => info!("NET | link up, no address, {} polls", polls),
            },
            AppEvent::LinkLost => warn!("NET | link lost"),
            AppEvent::BrokerConnected {
                attempts,
                subscriptions,
            } => {
                info!(
                    "NET | broker connected (attempts={}, subscriptions={})",
                    attempts, subscriptions
                );
            }
            AppEvent::BrokerLost => warn!("NET | broker lost"),
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::PlaybackStarted { kind, attempts } => {
                info!("PLAY | {:?} started after {} attempt(s)", kind, attempts);
            }
            AppEvent::PlaybackAborted { attempts } => {
                warn!("PLAY | aborted after {} attempts", attempts);
            }
            AppEvent::VolumeChanged {
                volume,
                elapsed_secs,
            } => {
                info!("VOL | {} at {}s", volume, elapsed_secs);
            }
            AppEvent::PlaybackStopped(reason) => {
                info!("PLAY | stopped ({:?})", reason);
            }
            AppEvent::IdentityPublished => info!("NET | identity published"),
            AppEvent::DiagnosticsPublished => info!("DIAG | report published"),
            AppEvent::SuspendScheduled { minutes } => {
                info!("SLEEP | suspending for {} min", minutes);
            }
            AppEvent::SuspendRejected => warn!("SLEEP | request rejected"),
            AppEvent::MessageIgnored => info!("MSG | ignored"),
        }
    }
}
