//! Power controller: sleep command → timed deep sleep.
//!
//! A sleep payload is a decimal number of minutes.  Malformed, zero, and
//! negative values are rejected (logged, no suspend) rather than being read
//! as zero, which on this hardware would mean an immediate reboot loop.

use core::fmt;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, PowerPort};

const MICROS_PER_MINUTE: u64 = 60 * 1_000_000;

/// Why a sleep request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendError {
    /// Payload is not a decimal integer.
    NotANumber,
    /// Zero or negative duration.
    NotPositive(i64),
    /// Duration overflows the wake timer.
    TooLong,
    /// The hardware refused to arm the wake timer.
    TimerRejected,
}

impl fmt::Display for SuspendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber => write!(f, "sleep duration is not a number"),
            Self::NotPositive(m) => write!(f, "sleep duration {} must be positive", m),
            Self::TooLong => write!(f, "sleep duration overflows wake timer"),
            Self::TimerRejected => write!(f, "wake timer rejected"),
        }
    }
}

/// Parse a sleep payload into a positive number of whole minutes.
pub fn parse_minutes(payload: &str) -> Result<i64, SuspendError> {
    let minutes: i64 = payload
        .trim()
        .parse()
        .map_err(|_| SuspendError::NotANumber)?;
    if minutes <= 0 {
        return Err(SuspendError::NotPositive(minutes));
    }
    minutes_to_micros(minutes as u64)?;
    Ok(minutes)
}

/// Minutes → wake-timer microseconds.
pub fn minutes_to_micros(minutes: u64) -> Result<u64, SuspendError> {
    minutes
        .checked_mul(MICROS_PER_MINUTE)
        .ok_or(SuspendError::TooLong)
}

#[derive(Debug, Default)]
pub struct PowerController;

impl PowerController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the wake timer for `minutes` and suspend.
    ///
    /// On hardware this does not return; the device restarts from the top
    /// of startup when the timer fires.  `minutes` must be positive.
    pub fn schedule_suspend(
        &self,
        minutes: i64,
        power: &mut impl PowerPort,
        sink: &mut impl EventSink,
    ) -> Result<(), SuspendError> {
        if minutes <= 0 {
            warn!("Power: refusing to sleep for {} minutes", minutes);
            sink.emit(&AppEvent::SuspendRejected);
            return Err(SuspendError::NotPositive(minutes));
        }
        let minutes = minutes as u64;
        let micros = match minutes_to_micros(minutes) {
            Ok(us) => us,
            Err(e) => {
                warn!("Power: {}", e);
                sink.emit(&AppEvent::SuspendRejected);
                return Err(e);
            }
        };

        if let Err(e) = power.enable_timer_wakeup(micros) {
            warn!("Power: {}, staying awake", e);
            sink.emit(&AppEvent::SuspendRejected);
            return Err(SuspendError::TimerRejected);
        }

        sink.emit(&AppEvent::SuspendScheduled { minutes });
        info!("Going to sleep for {} min ({} us)...", minutes, micros);
        power.deep_sleep();
        Ok(())
    }
}
