//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing maintenance events to the ESP-IDF
//! logger (UART / USB-CDC on the device, `env_logger`-style output on host).

use log::{debug, info, warn};

use crate::app::events::{MaintEvent, RebootReason};
use crate::app::ports::{EventSink, UpdateEvent, UploadEvent};

/// Adapter that logs every [`MaintEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn log_update(event: &UpdateEvent) {
    match event {
        UpdateEvent::Started { size } => info!("[OTA] start, {} bytes", size),
        UpdateEvent::Progress { received, total } => {
            let pct = (*received as u64 * 100) / (*total).max(1) as u64;
            debug!("[OTA] {}% ({}/{})", pct, received, total);
        }
        UpdateEvent::Completed => info!("[OTA] done"),
        UpdateEvent::Failed(e) => warn!("[OTA] error: {}", e),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &MaintEvent) {
        match event {
            MaintEvent::StateChanged { from, to } => {
                info!("[Maint] state {:?} -> {:?}", from, to);
            }
            MaintEvent::Entering => info!("[Maint] entering maintenance mode"),
            MaintEvent::StationConnected { ip } => info!("[Maint] STA connected, IP {}", ip),
            MaintEvent::StationFailed(e) => warn!("[Maint] STA failed: {}", e),
            MaintEvent::AccessPointStarted { ssid, ip } => {
                info!("[Maint] AP '{}' up, IP {}", ssid, ip);
            }
            MaintEvent::AccessPointFailed(e) => warn!("[Maint] AP failed: {}", e),
            MaintEvent::NetworkUnavailable => warn!("[Maint] no network, services unreachable"),
            MaintEvent::DiscoveryStarted { records } => {
                info!("[Maint] mDNS up, {} services", records);
            }
            MaintEvent::DiscoveryFailed(e) => warn!("[Maint] {}", e),
            MaintEvent::ServiceStarted { kind, port } => {
                info!("[Maint] {} listening on {}", kind.name(), port);
            }
            MaintEvent::ServiceFailed { kind, error } => {
                warn!("[Maint] {} failed: {}", kind.name(), error);
            }
            MaintEvent::Ready => info!("[Maint] ready"),
            MaintEvent::BeaconSent => debug!("[Maint] beacon"),
            MaintEvent::ConsoleConnected => info!("[Maint] telnet client connected"),
            MaintEvent::ConsoleDisplaced => info!("[Maint] telnet client replaced"),
            MaintEvent::ConsoleCommand { line } => debug!("[Maint] cmd '{}'", line),
            MaintEvent::Update(u) => log_update(u),
            MaintEvent::Upload(UploadEvent::Stored { path, bytes }) => {
                info!("[Maint] upload stored {} ({} bytes)", path, bytes);
            }
            MaintEvent::Upload(UploadEvent::Rejected(e)) => {
                warn!("[Maint] upload rejected: {}", e);
            }
            MaintEvent::FilesystemFormatted => info!("[Maint] filesystem formatted"),
            MaintEvent::Rebooting(RebootReason::ConsoleCommand) => {
                info!("[Maint] rebooting (console)");
            }
            MaintEvent::Rebooting(RebootReason::UpdateComplete) => {
                info!("[Maint] rebooting into new firmware");
            }
        }
    }
}
