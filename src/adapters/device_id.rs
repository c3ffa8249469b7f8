//! Station identity derived from the ESP32 factory MAC address.
//!
//! The MAC is burned into eFuse, so everything derived from it is stable
//! across reboots and reflashes; the access-point SSID suffix comes from
//! here.

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Colon-separated uppercase form, e.g. `DE:AD:BE:EF:CA:FE`.
pub fn mac_string(mac: &MacAddress) -> heapless::String<17> {
    use core::fmt::Write;
    let mut out = heapless::String::new();
    let _ = write!(
        out,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    out
}
