//! Wi-Fi adapter for maintenance mode.
//!
//! Implements [`NetworkPort`]: station association with a bounded wait,
//! single-client soft-AP fallback, power-save control and RSSI.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF Wi-Fi driver via `esp_idf_svc::wifi`.
//!   The same driver instance already carries ESP-NOW in game mode.
//! - **all other targets**: simulation for host-side tests.

use std::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{ConnectivityError, NetMode, NetworkPort};
use crate::config::is_printable_ascii;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi,
};

#[cfg(not(target_os = "espidf"))]
const SIM_AP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
#[cfg(not(target_os = "espidf"))]
const SIM_STA_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidCredentials);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidCredentials);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    mode: NetMode,
    ip: Ipv4Addr,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: whether a configured AP answers.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_power_save: bool,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            mode: NetMode::Off,
            ip: Ipv4Addr::UNSPECIFIED,
            wifi,
        }
    }

    /// Simulation adapter. `ap_reachable` decides whether station
    /// association succeeds.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(ap_reachable: bool) -> Self {
        Self {
            mode: NetMode::Off,
            ip: Ipv4Addr::UNSPECIFIED,
            sim_ap_reachable: ap_reachable,
            sim_power_save: true,
        }
    }

    /// Start the driver in station mode without associating. The peer
    /// radio needs this before it can lock a channel.
    #[cfg(target_os = "espidf")]
    pub fn start_radio(&mut self) -> Result<(), ConnectivityError> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .map_err(|_| ConnectivityError::Driver)?;
        self.wifi.start().map_err(|e| {
            warn!("WiFi: radio start failed: {:?}", e);
            ConnectivityError::Driver
        })?;
        info!("WiFi: radio started (unassociated)");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn power_save(&self) -> bool {
        self.sim_power_save
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_power_save(&mut self, enabled: bool) {
        use esp_idf_svc::sys::{
            esp, esp_wifi_set_ps, wifi_ps_type_t_WIFI_PS_MIN_MODEM, wifi_ps_type_t_WIFI_PS_NONE,
        };
        let mode = if enabled {
            wifi_ps_type_t_WIFI_PS_MIN_MODEM
        } else {
            wifi_ps_type_t_WIFI_PS_NONE
        };
        // SAFETY: plain driver setter, valid once the driver is initialised.
        if let Err(e) = esp!(unsafe { esp_wifi_set_ps(mode) }) {
            warn!("WiFi: esp_wifi_set_ps failed: {:?}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_power_save(&mut self, enabled: bool) {
        self.sim_power_save = enabled;
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(
        &mut self,
        ssid: &str,
        pass: &str,
        hostname: &str,
        timeout_ms: u32,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        use esp_idf_hal::delay::FreeRtos;

        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| ConnectivityError::InvalidCredentials)?,
            password: pass
                .try_into()
                .map_err(|_| ConnectivityError::InvalidCredentials)?,
            auth_method: if pass.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        self.wifi
            .set_configuration(&config)
            .map_err(|_| ConnectivityError::Driver)?;
        if let Err(e) = self.wifi.wifi_mut().sta_netif_mut().set_hostname(hostname) {
            warn!("WiFi: set_hostname failed: {:?}", e);
        }
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| ConnectivityError::Driver)?;
        }
        self.wifi
            .wifi_mut()
            .connect()
            .map_err(|_| ConnectivityError::Driver)?;

        let mut waited = 0;
        while !self.wifi.is_up().unwrap_or(false) {
            if waited >= timeout_ms {
                let _ = self.wifi.disconnect();
                return Err(ConnectivityError::Timeout);
            }
            FreeRtos::delay_ms(50);
            waited += 50;
        }

        let info = self
            .wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .map_err(|_| ConnectivityError::Driver)?;
        Ok(info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(
        &mut self,
        ssid: &str,
        _pass: &str,
        hostname: &str,
        timeout_ms: u32,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        if !self.sim_ap_reachable {
            warn!("WiFi(sim): '{}' not reachable within {} ms", ssid, timeout_ms);
            return Err(ConnectivityError::Timeout);
        }
        info!("WiFi(sim): '{}' joined '{}'", hostname, ssid);
        Ok(SIM_STA_IP)
    }

    #[cfg(target_os = "espidf")]
    fn platform_soft_ap(
        &mut self,
        ssid: &str,
        pass: &str,
        channel: u8,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        let config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| ConnectivityError::InvalidCredentials)?,
            password: pass
                .try_into()
                .map_err(|_| ConnectivityError::InvalidCredentials)?,
            auth_method: if pass.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            channel,
            max_connections: 1,
            ..Default::default()
        });

        if self.wifi.is_started().unwrap_or(false) {
            let _ = self.wifi.stop();
        }
        self.wifi
            .set_configuration(&config)
            .map_err(|_| ConnectivityError::ApStartFailed)?;
        self.wifi
            .start()
            .map_err(|_| ConnectivityError::ApStartFailed)?;
        self.wifi
            .wait_netif_up()
            .map_err(|_| ConnectivityError::ApStartFailed)?;

        let info = self
            .wifi
            .wifi()
            .ap_netif()
            .get_ip_info()
            .map_err(|_| ConnectivityError::Driver)?;
        Ok(info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_soft_ap(
        &mut self,
        ssid: &str,
        _pass: &str,
        channel: u8,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        info!("WiFi(sim): soft-AP '{}' on channel {}", ssid, channel);
        Ok(SIM_AP_IP)
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> i32 {
        use esp_idf_svc::sys::{esp, esp_wifi_sta_get_ap_info, wifi_ap_record_t};
        // SAFETY: all-zero is a valid wifi_ap_record_t; the driver fills it.
        let mut record: wifi_ap_record_t = unsafe { core::mem::zeroed() };
        match esp!(unsafe { esp_wifi_sta_get_ap_info(&mut record) }) {
            Ok(()) => i32::from(record.rssi),
            Err(_) => 0,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> i32 {
        -60
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn set_power_save(&mut self, enabled: bool) {
        info!("WiFi: power save {}", if enabled { "on" } else { "off" });
        self.platform_power_save(enabled);
    }

    fn connect_sta(
        &mut self,
        ssid: &str,
        pass: &str,
        hostname: &str,
        timeout_ms: u32,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(pass)?;

        info!("WiFi: connecting to '{}' ({} ms budget)", ssid, timeout_ms);
        match self.platform_connect(ssid, pass, hostname, timeout_ms) {
            Ok(ip) => {
                self.mode = NetMode::Station;
                self.ip = ip;
                Ok(ip)
            }
            Err(e) => {
                self.mode = NetMode::Off;
                self.ip = Ipv4Addr::UNSPECIFIED;
                Err(e)
            }
        }
    }

    fn start_soft_ap(
        &mut self,
        ssid: &str,
        pass: &str,
        channel: u8,
    ) -> Result<Ipv4Addr, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(pass)?;
        if !(1..=13).contains(&channel) {
            return Err(ConnectivityError::ApStartFailed);
        }

        let ip = self.platform_soft_ap(ssid, pass, channel)?;
        self.mode = NetMode::AccessPoint;
        self.ip = ip;
        Ok(ip)
    }

    fn mode(&self) -> NetMode {
        self.mode
    }

    fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    fn rssi(&self) -> i32 {
        match self.mode {
            NetMode::Station => self.platform_rssi(),
            _ => 0,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
