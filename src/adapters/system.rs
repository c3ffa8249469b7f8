//! System services adapter: heap, delays, restart, factory MAC.

use crate::app::ports::SystemPort;

use super::device_id::{MacAddress, read_mac};

pub struct SystemAdapter {
    mac: MacAddress,
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
    #[cfg(not(target_os = "espidf"))]
    delayed_ms: u64,
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self {
            mac: read_mac(),
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
            #[cfg(not(target_os = "espidf"))]
            delayed_ms: 0,
        }
    }

    /// Restarts requested so far (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Total time spent in `delay_ms` (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn delayed_ms(&self) -> u64 {
        self.delayed_ms
    }
}

impl Default for SystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl SystemPort for SystemAdapter {
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    fn restart(&mut self) {
        log::info!("system: restarting");
        // SAFETY: esp_restart never returns.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    fn factory_mac(&self) -> [u8; 6] {
        self.mac
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemPort for SystemAdapter {
    fn free_heap(&self) -> u32 {
        256 * 1024
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += u64::from(ms);
    }

    fn restart(&mut self) {
        log::info!("system: restart requested (simulation)");
        self.restarts += 1;
    }

    fn factory_mac(&self) -> [u8; 6] {
        self.mac
    }
}
