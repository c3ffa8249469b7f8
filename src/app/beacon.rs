//! Telemetry beacon record and emission schedule.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::config::MaintConfig;

/// One beacon datagram. Field order is the on-air key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeaconRecord<'a> {
    pub host: &'a str,
    pub ip: String,
    #[serde(rename = "type")]
    pub station_type: &'static str,
    pub id: u8,
    pub mode: &'static str,
    pub rssi: i32,
}

impl<'a> BeaconRecord<'a> {
    pub fn new(config: &'a MaintConfig, ip: Ipv4Addr, rssi: i32) -> Self {
        Self {
            host: config.host.as_str(),
            ip: ip.to_string(),
            station_type: config.station_type.label(),
            id: config.station_id,
            mode: "maint",
            rssi,
        }
    }

    /// Compact JSON followed by a newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Decides when the next beacon is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconSchedule {
    interval_ms: u32,
    last_ms: Option<u32>,
}

impl BeaconSchedule {
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// Nothing sent yet, or at least one interval elapsed (wrapping).
    pub fn due(&self, now_ms: u32) -> bool {
        match self.last_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.interval_ms,
        }
    }

    pub fn mark(&mut self, now_ms: u32) {
        self.last_ms = Some(now_ms);
    }
}
