//! Station configuration.
//!
//! Everything a station needs to run its transport and maintenance mode.
//! Persisted as a postcard blob through [`ConfigPort`](crate::app::ports::ConfigPort);
//! a missing blob yields [`StationConfig::default()`].

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::protocol::{ALL_STATIONS, StationType};
use crate::transport::TransportConfig;

pub type Ssid = heapless::String<32>;
pub type Passphrase = heapless::String<64>;
pub type Hostname = heapless::String<32>;

/// Copy `s` into a bounded string, `None` if it does not fit.
pub fn bounded<const N: usize>(s: &str) -> Option<heapless::String<N>> {
    let mut out = heapless::String::new();
    out.push_str(s).ok()?;
    Some(out)
}

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E`.
pub fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn is_hostname(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Maintenance-mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintConfig {
    // --- Station-mode network ---
    /// Empty means "do not try station mode".
    pub ssid: Ssid,
    pub pass: Passphrase,
    /// mDNS/DHCP hostname, also the AP SSID prefix.
    pub host: Hostname,
    pub sta_timeout_ms: u32,
    pub disable_power_save: bool,

    // --- Access-point fallback ---
    pub ap_fallback: bool,
    pub ap_channel: u8,
    pub ap_pass: Passphrase,

    // --- Trigger ---
    pub button_pin: u8,
    pub hold_ms: u32,

    // --- Identity ---
    pub station_type: StationType,
    pub station_id: u8,

    // --- Services ---
    pub enable_beacon: bool,
    pub beacon_port: u16,
    pub beacon_interval_ms: u32,
    pub console_port: u16,
    pub ota_port: u16,
    pub enable_upload: bool,
    pub upload_port: u16,
}

impl Default for MaintConfig {
    fn default() -> Self {
        Self {
            ssid: Ssid::new(),
            pass: Passphrase::new(),
            host: bounded("trex").unwrap_or_default(),
            sta_timeout_ms: 8_000,
            disable_power_save: true,

            ap_fallback: true,
            ap_channel: 6,
            ap_pass: bounded("trexsetup").unwrap_or_default(),

            button_pin: 0, // BOOT
            hold_ms: 1_500,

            station_type: StationType::Loot,
            station_id: 1,

            enable_beacon: true,
            beacon_port: 32_458,
            beacon_interval_ms: 5_000,
            console_port: 23,
            ota_port: 3_232,
            enable_upload: false,
            upload_port: 80,
        }
    }
}

impl MaintConfig {
    /// Set station-mode credentials, rejecting values that do not fit.
    pub fn with_credentials(mut self, ssid: &str, pass: &str) -> Result<Self, ConfigError> {
        self.ssid = bounded(ssid).ok_or(ConfigError::ValidationFailed("ssid too long"))?;
        self.pass = bounded(pass).ok_or(ConfigError::ValidationFailed("pass too long"))?;
        Ok(self)
    }

    pub fn with_host(mut self, host: &str) -> Result<Self, ConfigError> {
        self.host = bounded(host).ok_or(ConfigError::ValidationFailed("host too long"))?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_printable_ascii(&self.ssid) {
            return Err(ConfigError::ValidationFailed("ssid must be printable ASCII"));
        }
        if !self.pass.is_empty() && !(8..=63).contains(&self.pass.len()) {
            return Err(ConfigError::ValidationFailed("pass must be empty or 8–63 chars"));
        }
        if !is_printable_ascii(&self.pass) {
            return Err(ConfigError::ValidationFailed("pass must be printable ASCII"));
        }
        if !is_hostname(&self.host) {
            return Err(ConfigError::ValidationFailed("host must be [A-Za-z0-9-]"));
        }
        if !(1_000..=60_000).contains(&self.sta_timeout_ms) {
            return Err(ConfigError::ValidationFailed("sta_timeout_ms must be 1000–60000"));
        }
        if self.ap_fallback {
            if !(1..=13).contains(&self.ap_channel) {
                return Err(ConfigError::ValidationFailed("ap_channel must be 1–13"));
            }
            if !(8..=63).contains(&self.ap_pass.len()) || !is_printable_ascii(&self.ap_pass) {
                return Err(ConfigError::ValidationFailed("ap_pass must be 8–63 printable chars"));
            }
        }
        if !(1..=60_000).contains(&self.hold_ms) {
            return Err(ConfigError::ValidationFailed("hold_ms must be 1–60000"));
        }
        if self.station_id == ALL_STATIONS {
            return Err(ConfigError::ValidationFailed("station_id 255 is reserved"));
        }
        if self.enable_beacon && (self.beacon_port == 0 || self.beacon_interval_ms < 100) {
            return Err(ConfigError::ValidationFailed(
                "beacon needs a port and interval_ms >= 100",
            ));
        }
        if self.console_port == 0 || self.ota_port == 0 || self.console_port == self.ota_port {
            return Err(ConfigError::ValidationFailed(
                "console_port and ota_port must be distinct and non-zero",
            ));
        }
        if self.enable_upload
            && (self.upload_port == 0
                || self.upload_port == self.console_port
                || self.upload_port == self.ota_port)
        {
            return Err(ConfigError::ValidationFailed(
                "upload_port must be non-zero and unique",
            ));
        }
        Ok(())
    }
}

/// Complete persisted station configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StationConfig {
    pub maint: MaintConfig,
    pub transport: TransportConfig,
}

impl StationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.maint.validate()?;
        if !(1..=13).contains(&self.transport.wifi_channel) {
            return Err(ConfigError::ValidationFailed("wifi_channel must be 1–13"));
        }
        if self.transport.udp_port == 0 {
            return Err(ConfigError::ValidationFailed("udp_port must be non-zero"));
        }
        Ok(())
    }
}
