//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MaintController (domain)
//! ```
//!
//! Every vendor capability the maintenance controller touches (Wi-Fi,
//! mDNS, OTA, telnet, UDP beacon, HTTP upload, filesystem, restart) sits
//! behind one of these traits. The controller owns them as trait objects,
//! so tests swap in recording mocks and the domain core never touches
//! hardware directly.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - The console and upload services are unauthenticated; they only run in
//!   maintenance mode, which needs physical access to the trigger.

use core::fmt;
use std::io::Read;
use std::net::Ipv4Addr;

use crate::config::StationConfig;
use crate::error::{InitError, TransportError};
use crate::ota::OtaError;

// ───────────────────────────────────────────────────────────────
// Network port (station / access point)
// ───────────────────────────────────────────────────────────────

/// Current Wi-Fi role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetMode {
    Off,
    Station,
    AccessPoint,
}

pub trait NetworkPort {
    /// Enable or disable modem power-save.
    fn set_power_save(&mut self, enabled: bool);

    /// Associate with `ssid` and wait up to `timeout_ms` for an address.
    fn connect_sta(
        &mut self,
        ssid: &str,
        pass: &str,
        hostname: &str,
        timeout_ms: u32,
    ) -> Result<Ipv4Addr, ConnectivityError>;

    /// Start a single-client access point and return its address.
    fn start_soft_ap(
        &mut self,
        ssid: &str,
        pass: &str,
        channel: u8,
    ) -> Result<Ipv4Addr, ConnectivityError>;

    fn mode(&self) -> NetMode;

    /// Current address; `0.0.0.0` when down.
    fn ip(&self) -> Ipv4Addr;

    /// Signal strength of the associated AP in dBm; 0 when not a station.
    fn rssi(&self) -> i32;
}

// ───────────────────────────────────────────────────────────────
// Discovery port (mDNS)
// ───────────────────────────────────────────────────────────────

/// One advertised service, e.g. `_telnet._tcp` on port 23.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub service: &'static str,
    pub proto: &'static str,
    pub port: u16,
    pub txt: Vec<(&'static str, String)>,
}

impl ServiceRecord {
    pub fn new(service: &'static str, proto: &'static str, port: u16) -> Self {
        Self {
            service,
            proto,
            port,
            txt: Vec::new(),
        }
    }

    pub fn with_txt(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.txt.push((key, value.into()));
        self
    }
}

pub trait DiscoveryPort {
    /// Start the responder and claim `hostname`.
    fn start(&mut self, hostname: &str) -> Result<(), DiscoveryError>;

    fn add_service(&mut self, record: &ServiceRecord) -> Result<(), DiscoveryError>;
}

// ───────────────────────────────────────────────────────────────
// Firmware-update port
// ───────────────────────────────────────────────────────────────

/// Progress reported by the update listener, at most one per poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Started { size: u32 },
    Progress { received: u32, total: u32 },
    /// Image verified and marked bootable; the station must restart.
    Completed,
    Failed(OtaError),
}

pub trait UpdatePort {
    fn begin(&mut self, port: u16) -> Result<(), InitError>;

    /// Service the listener once without blocking.
    fn poll(&mut self) -> Option<UpdateEvent>;
}

// ───────────────────────────────────────────────────────────────
// Console ports (telnet)
// ───────────────────────────────────────────────────────────────

pub trait ConsoleServer {
    fn begin(&mut self, port: u16) -> Result<(), InitError>;

    /// Return a newly connected client, if one is waiting.
    fn accept(&mut self) -> Option<Box<dyn ConsoleSession>>;
}

/// One connected console client.
pub trait ConsoleSession {
    /// Next complete line (without terminator), if one has arrived.
    fn read_line(&mut self) -> Option<String>;

    fn write_str(&mut self, text: &str);

    fn is_connected(&self) -> bool;

    fn close(&mut self);
}

/// Game-logic extension point for console commands the core does not know.
pub trait CommandHandler {
    /// Handle `line` (trimmed, original case) and return `true`, or return
    /// `false` to decline.
    fn handle(&mut self, line: &str, out: &mut dyn ConsoleSession) -> bool;
}

impl<F> CommandHandler for F
where
    F: FnMut(&str, &mut dyn ConsoleSession) -> bool,
{
    fn handle(&mut self, line: &str, out: &mut dyn ConsoleSession) -> bool {
        self(line, out)
    }
}

// ───────────────────────────────────────────────────────────────
// Beacon port
// ───────────────────────────────────────────────────────────────

pub trait BeaconPort {
    fn begin(&mut self, port: u16) -> Result<(), InitError>;

    /// Broadcast one record.
    fn send(&mut self, record: &str) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// System port
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    fn free_heap(&self) -> u32;

    fn delay_ms(&mut self, ms: u32);

    /// Reboot the chip. Does not return on the device.
    fn restart(&mut self);

    /// Factory-programmed station MAC.
    fn factory_mac(&self) -> [u8; 6];
}

// ───────────────────────────────────────────────────────────────
// Upload + filesystem ports
// ───────────────────────────────────────────────────────────────

/// Fixed path every upload is written to.
pub const ASSET_PATH: &str = "/asset.bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Asset written to `path`, replacing any previous content.
    Stored { path: String, bytes: u64 },
    Rejected(UploadError),
}

pub trait UploadPort {
    fn begin(&mut self, port: u16) -> Result<(), InitError>;

    /// Next finished upload, if any.
    fn poll(&mut self) -> Option<UploadEvent>;

    /// Filesystem the uploads land on.
    fn fs(&mut self) -> &mut dyn FilesystemPort;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub path: String,
    pub size: u64,
}

pub trait FilesystemPort {
    fn total_bytes(&self) -> u64;
    fn used_bytes(&self) -> u64;
    fn list(&self) -> Result<Vec<FsEntry>, FsError>;
    fn stat(&self, path: &str) -> Result<FsEntry, FsError>;
    fn remove(&mut self, path: &str) -> Result<(), FsError>;
    /// Stream `source` into `path` until it ends, replacing any previous
    /// content. Returns the number of bytes written.
    ///
    /// A failing `source` yields [`FsError::SourceFailed`] and leaves the
    /// previous content in place.
    fn write_from(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, FsError>;
    /// Erase everything.
    fn format(&mut self) -> Result<(), FsError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`MaintEvent`](super::events::MaintEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::MaintEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists the station configuration.
///
/// Implementations MUST call [`StationConfig::validate`] before persisting
/// and reject, not clamp, invalid values.
pub trait ConfigPort {
    /// Returns [`StationConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<StationConfig, ConfigError>;

    fn save(&self, config: &StationConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value storage (NVS on the device).
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// SSID or passphrase failed validation.
    InvalidCredentials,
    /// No address within the association timeout.
    Timeout,
    /// The access point could not be started.
    ApStartFailed,
    /// Driver call failed.
    Driver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
    StartFailed,
    ServiceRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    InvalidPath,
    NoSpace,
    Io,
    /// The data being written could not be read.
    SourceFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    BadRequest,
    TooLarge,
    Storage(FsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::Timeout => write!(f, "association timed out"),
            Self::ApStartFailed => write!(f, "access point start failed"),
            Self::Driver => write!(f, "Wi-Fi driver error"),
        }
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed => write!(f, "mDNS start failed"),
            Self::ServiceRejected => write!(f, "mDNS service rejected"),
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::InvalidPath => write!(f, "invalid path"),
            Self::NoSpace => write!(f, "no space"),
            Self::Io => write!(f, "I/O error"),
            Self::SourceFailed => write!(f, "source read failed"),
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest => write!(f, "bad request"),
            Self::TooLarge => write!(f, "upload too large"),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl From<FsError> for UploadError {
    fn from(e: FsError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
