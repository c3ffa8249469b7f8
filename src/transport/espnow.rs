//! ESP-NOW radio driver.
//!
//! Expects the Wi-Fi driver to be started in station mode (not associated)
//! before [`RadioDriver::lock_channel`] runs.

use std::sync::Arc;

use esp_idf_svc::espnow::{EspNow, PeerInfo, SendStatus};
use esp_idf_svc::sys::{
    ESP_OK, esp_wifi_set_channel, esp_wifi_set_promiscuous,
    wifi_second_chan_t_WIFI_SECOND_CHAN_NONE,
};
use log::{info, warn};

use super::radio::{BROADCAST_ADDR, RadioDriver, RadioStats, RxLatch};
use crate::error::TransportError;

pub struct EspNowDriver {
    espnow: Option<EspNow<'static>>,
    channel: u8,
}

impl EspNowDriver {
    pub fn new() -> Self {
        Self {
            espnow: None,
            channel: 0,
        }
    }
}

impl Default for EspNowDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDriver for EspNowDriver {
    fn lock_channel(&mut self, channel: u8) -> Result<(), TransportError> {
        // The channel can only be forced while promiscuous mode is on.
        // SAFETY: plain driver setters; the Wi-Fi driver is started.
        let ret = unsafe {
            esp_wifi_set_promiscuous(true);
            let ret = esp_wifi_set_channel(channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE);
            esp_wifi_set_promiscuous(false);
            ret
        };
        if ret != ESP_OK as i32 {
            warn!("[ESP-NOW] esp_wifi_set_channel({}) failed ({})", channel, ret);
            return Err(TransportError::InitFailed);
        }
        self.channel = channel;
        Ok(())
    }

    fn start(&mut self, stats: Arc<RadioStats>) -> Result<(), TransportError> {
        let espnow = EspNow::take().map_err(|e| {
            warn!("[ESP-NOW] init failed: {}", e);
            TransportError::InitFailed
        })?;

        espnow
            .register_send_cb(move |_mac, status| {
                stats.record_send(matches!(status, SendStatus::SUCCESS));
            })
            .map_err(|_| TransportError::InitFailed)?;

        if espnow.peer_exists(BROADCAST_ADDR).unwrap_or(false) {
            let _ = espnow.del_peer(BROADCAST_ADDR);
        }
        let peer = PeerInfo {
            peer_addr: BROADCAST_ADDR,
            channel: self.channel,
            encrypt: false,
            ..Default::default()
        };
        espnow.add_peer(peer).map_err(|e| {
            warn!("[ESP-NOW] add broadcast peer failed: {}", e);
            TransportError::InitFailed
        })?;

        info!("[ESP-NOW] started on channel {}", self.channel);
        self.espnow = Some(espnow);
        Ok(())
    }

    fn attach_rx(&mut self, mut rx: RxLatch) {
        let Some(espnow) = self.espnow.as_ref() else {
            warn!("[ESP-NOW] receive latch attached before start");
            return;
        };
        if let Err(e) = espnow.register_recv_cb(move |_info, data| rx.deliver(data)) {
            warn!("[ESP-NOW] receive callback registration failed: {}", e);
        }
    }

    fn send(&mut self, peer: &[u8; 6], data: &[u8]) -> Result<(), TransportError> {
        let espnow = self.espnow.as_ref().ok_or(TransportError::NotInitialized)?;
        espnow
            .send(*peer, data)
            .map_err(|_| TransportError::SendFailed)
    }
}
