//! MQTT client identity.
//!
//! AWS IoT drops an existing session when a second connection presents
//! the same client id, so every board derives its own from the Wi-Fi
//! station MAC: `SD-` followed by the NIC-specific half of the address
//! in uppercase hex.

use core::fmt::Write;

use crate::config::CLIENT_ID_LEN;

pub type ClientId = heapless::String<CLIENT_ID_LEN>;

pub type MacAddress = [u8; 6];

const CLIENT_ID_PREFIX: &str = "SD-";

/// Station MAC, as burned into eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is exactly the 6 bytes the call writes.
    let err = unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        )
    };
    if err != esp_idf_svc::sys::ESP_OK {
        log::warn!("esp_read_mac failed ({}), client id will not be unique", err);
    }
    mac
}

#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x24, 0x6F, 0x28, 0x0A, 0x0B, 0x0C]
}

pub fn client_id(mac: &MacAddress) -> ClientId {
    let mut id = ClientId::new();
    let _ = id.push_str(CLIENT_ID_PREFIX);
    for b in &mac[3..] {
        let _ = write!(id, "{:02X}", b);
    }
    id
}

/// `aa:bb:cc:dd:ee:ff`, for the boot log.
pub fn format_mac(mac: &MacAddress) -> heapless::String<17> {
    let mut s = heapless::String::new();
    for (i, b) in mac.iter().enumerate() {
        if i > 0 {
            let _ = s.push(':');
        }
        let _ = write!(s, "{:02x}", b);
    }
    s
}
