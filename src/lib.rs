//! TREX station firmware library.
//!
//! Wire protocol, station-to-station transports and the maintenance-mode
//! controller, exposed for the firmware binary and for host-side tests.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; everything else builds and runs on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod ota;
pub mod protocol;
pub mod transport;

pub use error::{Error, Result};
