//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements         | Connects to                |
//! |-----------------|--------------------|----------------------------|
//! | `hardware`      | AdcPort            | ESP32 ADC1 oneshot         |
//! |                 | IndicatorPort      | Cloud status LED GPIO      |
//! | `log_sink`      | EventSink          | Serial log output          |
//! | `nvs`           | ConfigPort         | NVS / in-memory store      |
//! |                 | StoragePort        |                            |
//! | `cert_store`    | (used by `nvs`)    | X.509 identity in NVS      |
//! | `provisioning`  | (uses StoragePort) | Soft-AP HTTP JSON API      |
//! | `shadow_client` | ShadowPort         | ESP-IDF MQTT client (mTLS) |
//! | `time`          |                    | ESP32 system timer / RTC   |
//! | `device_id`     |                    | eFuse factory MAC          |
//! | `wifi`          | ConnectivityPort   | ESP-IDF WiFi STA           |

pub mod cert_store;
pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod provisioning;
pub mod shadow_client;
pub mod time;
pub mod wifi;
