//! mDNS service advertisement adapter.
//!
//! Claims `<host>.local` and advertises the maintenance services
//! (`_telnet._tcp`, `_trexota._tcp`, `_trex._udp` and optionally
//! `_http._tcp`). Uses the `esp-idf-svc` mDNS wrapper on ESP-IDF and
//! records the advertisements on simulation targets.

use log::info;

use crate::app::ports::{DiscoveryError, DiscoveryPort, ServiceRecord};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mdns::EspMdns;

/// mDNS advertisement adapter.
pub struct MdnsAdapter {
    hostname: String,
    advertised: Vec<ServiceRecord>,
    #[cfg(target_os = "espidf")]
    mdns: Option<EspMdns>,
}

impl MdnsAdapter {
    pub fn new() -> Self {
        Self {
            hostname: String::new(),
            advertised: Vec::new(),
            #[cfg(target_os = "espidf")]
            mdns: None,
        }
    }

    /// Whether the responder has been started.
    pub fn is_active(&self) -> bool {
        !self.hostname.is_empty()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn advertised(&self) -> &[ServiceRecord] {
        &self.advertised
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, hostname: &str) -> Result<(), DiscoveryError> {
        let mut mdns = EspMdns::take().map_err(|e| {
            log::error!("mDNS: take failed: {:?}", e);
            DiscoveryError::StartFailed
        })?;
        mdns.set_hostname(hostname)
            .map_err(|_| DiscoveryError::StartFailed)?;
        mdns.set_instance_name("TREX station")
            .map_err(|_| DiscoveryError::StartFailed)?;
        self.mdns = Some(mdns);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, hostname: &str) -> Result<(), DiscoveryError> {
        if hostname.is_empty() {
            return Err(DiscoveryError::StartFailed);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_add(&mut self, record: &ServiceRecord) -> Result<(), DiscoveryError> {
        let Some(mdns) = self.mdns.as_mut() else {
            return Err(DiscoveryError::StartFailed);
        };
        let txt: Vec<(&str, &str)> = record
            .txt
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        mdns.add_service(None, record.service, record.proto, record.port, &txt)
            .map_err(|e| {
                log::warn!("mDNS: add_service {} failed: {:?}", record.service, e);
                DiscoveryError::ServiceRejected
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_add(&mut self, record: &ServiceRecord) -> Result<(), DiscoveryError> {
        if record.port == 0 {
            return Err(DiscoveryError::ServiceRejected);
        }
        Ok(())
    }
}

impl Default for MdnsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryPort for MdnsAdapter {
    fn start(&mut self, hostname: &str) -> Result<(), DiscoveryError> {
        if self.is_active() {
            return Ok(());
        }
        self.platform_start(hostname)?;
        self.hostname = hostname.to_string();
        info!("mDNS: responding as {}.local", hostname);
        Ok(())
    }

    fn add_service(&mut self, record: &ServiceRecord) -> Result<(), DiscoveryError> {
        if !self.is_active() {
            return Err(DiscoveryError::StartFailed);
        }
        self.platform_add(record)?;
        info!(
            "mDNS: {}.{} on {} ({} TXT)",
            record.service,
            record.proto,
            record.port,
            record.txt.len()
        );
        self.advertised.push(record.clone());
        Ok(())
    }
}
