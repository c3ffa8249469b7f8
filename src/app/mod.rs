//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the maintenance-mode rules for a TREX station:
//! trigger debounce, network bring-up, the telnet console, the telemetry
//! beacon and upload handling. All interaction with the outside world
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod beacon;
pub mod commands;
pub mod console;
pub mod events;
pub mod ports;
pub mod service;
