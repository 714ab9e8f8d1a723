//! Application core: domain logic behind port traits.
//!
//! Everything the bell endpoint decides (what a message means, when to
//! fade, when to sleep) lives here and in the sibling domain modules.
//! Interaction with the radio, broker, audio engine, and sleep controller
//! happens through the traits in [`ports`], so the whole core runs on the
//! host against mocks.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
