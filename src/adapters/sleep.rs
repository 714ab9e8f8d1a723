//! Deep-sleep adapter.
//!
//! Implements [`PowerPort`].  On the device the RTC timer is armed and the
//! chip enters deep sleep; it wakes with a full reset, so execution
//! resumes at the top of `main`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_sleep_enable_timer_wakeup` + `esp_deep_sleep_start`.
//! - **all other targets**: records the request and returns.

use log::info;

use crate::app::ports::{PowerError, PowerPort};

#[derive(Debug, Default)]
pub struct DeepSleepAdapter {
    #[cfg(not(target_os = "espidf"))]
    armed_us: Option<u64>,
    #[cfg(not(target_os = "espidf"))]
    sleeps: u32,
}

impl DeepSleepAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation: wake timer armed by the last request.
    #[cfg(not(target_os = "espidf"))]
    pub fn armed_us(&self) -> Option<u64> {
        self.armed_us
    }

    /// Simulation: deep sleeps entered so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sleeps(&self) -> u32 {
        self.sleeps
    }
}

#[cfg(target_os = "espidf")]
impl PowerPort for DeepSleepAdapter {
    fn enable_timer_wakeup(&mut self, duration_us: u64) -> Result<(), PowerError> {
        let ret = unsafe { esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(duration_us) };
        if ret != esp_idf_svc::sys::ESP_OK {
            return Err(PowerError::TimerRejected(ret));
        }
        Ok(())
    }

    fn deep_sleep(&mut self) {
        info!("Sleep: entering deep sleep");
        unsafe { esp_idf_svc::sys::esp_deep_sleep_start() }
    }
}

#[cfg(not(target_os = "espidf"))]
impl PowerPort for DeepSleepAdapter {
    fn enable_timer_wakeup(&mut self, duration_us: u64) -> Result<(), PowerError> {
        self.armed_us = Some(duration_us);
        Ok(())
    }

    fn deep_sleep(&mut self) {
        self.sleeps += 1;
        info!(
            "Sleep(sim): deep sleep for {} us",
            self.armed_us.unwrap_or_default()
        );
    }
}
