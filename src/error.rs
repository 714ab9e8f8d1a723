//! Unified error types for the Bellnode firmware.
//!
//! Every subsystem has its own small error enum (defined next to the port
//! it belongs to); this module funnels them into a single `Error` so the
//! startup path can report them uniformly.  Faults the loop recovers from
//! on its own, such as a lost broker session, never reach it.
//! All variants are `Copy` so they can be handed around without allocation.

use core::fmt;

use crate::app::ports::{AudioError, ConfigStoreError, LinkError};
use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The persisted configuration store could not be opened or validated.
    Store(ConfigStoreError),
    /// A configuration value is missing or out of range.
    Config(ConfigError),
    /// The wireless link failed.
    Link(LinkError),
    /// The audio engine refused an operation.
    Audio(AudioError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "config store: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Audio(e) => write!(f, "audio: {e}"),
        }
    }
}

impl From<ConfigStoreError> for Error {
    fn from(e: ConfigStoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<AudioError> for Error {
    fn from(e: AudioError) -> Self {
        Self::Audio(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
