//! Bellnode firmware library.
//!
//! Exposes the domain modules for integration testing and fuzzing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each adapter; everything else builds and tests on the host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod fsm;
pub mod network;
pub mod playback;
pub mod power;
pub mod retry;

pub mod adapters;
