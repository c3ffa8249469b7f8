//! Outbound maintenance events.
//!
//! The [`MaintController`](super::service::MaintController) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters decide
//! what to do with them; the firmware logs them.

use std::net::Ipv4Addr;

use super::ports::{ConnectivityError, DiscoveryError, UpdateEvent, UploadEvent};
use crate::error::InitError;
use crate::fsm::StateId;

/// Listener started during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Update,
    Console,
    Beacon,
    Upload,
}

impl ServiceKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Console => "console",
            Self::Beacon => "beacon",
            Self::Upload => "upload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootReason {
    ConsoleCommand,
    UpdateComplete,
}

/// Structured events emitted by the maintenance controller.
#[derive(Debug, Clone, PartialEq)]
pub enum MaintEvent {
    /// The trigger FSM changed state.
    StateChanged { from: StateId, to: StateId },

    /// Bring-up sequence started.
    Entering,

    StationConnected { ip: Ipv4Addr },
    StationFailed(ConnectivityError),
    AccessPointStarted { ssid: String, ip: Ipv4Addr },
    AccessPointFailed(ConnectivityError),
    /// Neither station nor access point came up; services run anyway.
    NetworkUnavailable,

    DiscoveryStarted { records: usize },
    DiscoveryFailed(DiscoveryError),

    ServiceStarted { kind: ServiceKind, port: u16 },
    ServiceFailed { kind: ServiceKind, error: InitError },

    /// Bring-up sequence finished.
    Ready,

    BeaconSent,
    ConsoleConnected,
    /// A new client replaced the previous one.
    ConsoleDisplaced,
    ConsoleCommand { line: String },

    Update(UpdateEvent),
    Upload(UploadEvent),

    FilesystemFormatted,
    Rebooting(RebootReason),
}
