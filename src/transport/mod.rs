//! Transport abstraction: best-effort broadcast of encoded frames.
//!
//! Concrete backends:
//! - [`radio::PeerRadioBackend`]: connectionless local-broadcast radio
//!   (ESP-NOW on the device), receive delivered from the radio task.
//! - [`udp::UdpBroadcastBackend`]: UDP datagrams to the subnet broadcast
//!   address, polled.
//!
//! Both are at-most-once, unordered and broadcast-only. There is no unicast
//! addressing: `send_to_server` and `broadcast` put the same bytes on air and
//! the hub filters by message type and source station.
//!
//! [`Router`] owns one backend chosen at runtime from [`TransportConfig`]
//! and forwards every call unchanged.

pub mod radio;
pub mod udp;

#[cfg(target_os = "espidf")]
pub mod espnow;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Default Wi-Fi channel shared by every station.
pub const DEFAULT_WIFI_CHANNEL: u8 = 6;

/// Well-known datagram port of the IP-broadcast backend.
pub const DEFAULT_UDP_PORT: u16 = 33333;

// ───────────────────────────────────────────────────────────────
// Configuration
// ───────────────────────────────────────────────────────────────

/// Which backend the router instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    PeerRadio,
    IpBroadcast,
}

/// Transport settings, persisted with the station configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Channel locked before the radio stack starts.
    pub wifi_channel: u8,
    pub udp_port: u16,
    /// Destination of IP-broadcast sends.
    pub broadcast_ip: [u8; 4],
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::PeerRadio,
            wifi_channel: DEFAULT_WIFI_CHANNEL,
            udp_port: DEFAULT_UDP_PORT,
            broadcast_ip: [255, 255, 255, 255],
        }
    }
}

impl TransportConfig {
    /// Defaults for a station that is (or is not) running on Wi-Fi in
    /// maintenance mode. The radio stack cannot share the interface with an
    /// associated station, so maintenance mode uses IP broadcast.
    pub fn for_mode(maintenance: bool) -> Self {
        Self {
            kind: if maintenance {
                TransportKind::IpBroadcast
            } else {
                TransportKind::PeerRadio
            },
            ..Self::default()
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Transport trait
// ───────────────────────────────────────────────────────────────

/// Frame-oriented broadcast channel.
pub trait Transport {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Bring the backend up. Calling it again after success is a no-op.
    fn init(&mut self, config: &TransportConfig) -> Result<(), TransportError>;

    /// Send a frame towards the hub.
    fn send_to_server(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Send a frame to every station in range.
    fn broadcast(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Hand received frames to `handler`. Called once per main-loop pass.
    fn poll(&mut self, handler: &mut dyn FnMut(&[u8]));
}

/// Receive callback owned by the [`Router`].
pub type RxHandler = Box<dyn FnMut(&[u8])>;

// ───────────────────────────────────────────────────────────────
// Router
// ───────────────────────────────────────────────────────────────

/// Owns the single active backend and the receive handler.
///
/// Adds no buffering and no retries: every result comes straight from the
/// backend.
pub struct Router {
    backend: Box<dyn Transport>,
    handler: Option<RxHandler>,
}

impl Router {
    /// Wrap an already-constructed backend (in-memory fakes in tests).
    pub fn new(backend: Box<dyn Transport>) -> Self {
        Self {
            backend,
            handler: None,
        }
    }

    /// Instantiate the backend named by `config.kind`.
    pub fn from_config(config: &TransportConfig) -> Self {
        let backend: Box<dyn Transport> = match config.kind {
            TransportKind::PeerRadio => Box::new(radio::PeerRadioBackend::new(default_radio())),
            TransportKind::IpBroadcast => Box::new(udp::UdpBroadcastBackend::new()),
        };
        info!("[Transport] selected {} backend", backend.name());
        Self::new(backend)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Install the receive handler, replacing any previous one.
    pub fn set_handler(&mut self, handler: impl FnMut(&[u8]) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn init(&mut self, config: &TransportConfig) -> Result<(), TransportError> {
        let result = self.backend.init(config);
        match result {
            Ok(()) => info!("[Transport] {} up", self.backend.name()),
            Err(e) => warn!("[Transport] {} init failed: {}", self.backend.name(), e),
        }
        result
    }

    pub fn send_to_server(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.backend.send_to_server(data)
    }

    pub fn broadcast(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.backend.broadcast(data)
    }

    /// Drive the backend's receive path. Frames arriving with no handler
    /// installed are discarded.
    pub fn poll(&mut self) {
        match self.handler.as_mut() {
            Some(handler) => self.backend.poll(&mut **handler),
            None => {
                let mut discard =
                    |frame: &[u8]| debug!("[Transport] no handler, dropped {} bytes", frame.len());
                self.backend.poll(&mut discard);
            }
        }
    }
}

#[cfg(target_os = "espidf")]
fn default_radio() -> espnow::EspNowDriver {
    espnow::EspNowDriver::new()
}

#[cfg(not(target_os = "espidf"))]
fn default_radio() -> radio::SimRadio {
    radio::SimRadio::new()
}
