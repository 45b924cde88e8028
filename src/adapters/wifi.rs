//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity.  Link transitions reported by the ESP-IDF event loop are
//! pushed onto the [`events`](crate::events) queue as `LinkUp`,
//! `LinkLost` or `ConnectFailed`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) before retrying.
//!
//! ## Access point
//!
//! An unprovisioned device instead brings up a WPA2 soft AP via
//! [`WifiAdapter::start_access_point`] so the provisioning server is
//! reachable.  The station machinery stays idle in that mode.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use log::{error, info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{KEY_PASSWORD, KEY_SSID, WIFI_NAMESPACE};
use crate::events::Event;

#[cfg(target_os = "espidf")]
use crate::events::push_event;
#[cfg(target_os = "espidf")]
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::modem::Modem;
#[cfg(target_os = "espidf")]
use esp_idf_svc::netif::IpEvent;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::EspDefaultNvsPartition;
#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent,
};
use std::sync::Arc;

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
    DriverInit,
    AccessPointFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no station credentials in NVS"),
            Self::InvalidSsid => write!(f, "SSID is not 1-32 printable bytes"),
            Self::InvalidPassword => write!(f, "passphrase is not 8-64 bytes"),
            Self::ConnectionFailed => write!(f, "association failed"),
            Self::AlreadyConnected => write!(f, "station already associated"),
            Self::DriverInit => write!(f, "wifi driver init failed"),
            Self::AccessPointFailed => write!(f, "soft AP could not be started"),
        }
    }
}

pub trait ConnectivityPort {
    fn connect(&mut self) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Drive reconnection.  Call from the main loop every tick.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, next_try_ms: u64 },
    /// Serving the provisioning soft AP.
    AccessPoint,
}

const INITIAL_BACKOFF_SECS: u32 = 2;
/// How long an association may take before it is retried.
const ASSOC_TIMEOUT_MS: u64 = 15_000;
const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// SSID: 1-32 printable ASCII bytes.  Passphrase: empty (open network)
/// or 8-64 bytes (WPA2-PSK).
pub(crate) fn validate_credentials(ssid: &str, password: &str) -> Result<(), ConnectivityError> {
    let printable = ssid.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if !(1..=32).contains(&ssid.len()) || !printable {
        return Err(ConnectivityError::InvalidSsid);
    }
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

/// Read one credential string; missing is `Ok(None)`.
fn read_credential<const N: usize>(
    storage: &impl StoragePort,
    key: &str,
) -> Result<Option<heapless::String<N>>, ConnectivityError> {
    let mut buf = [0u8; N];
    let len = match storage.read(WIFI_NAMESPACE, key, &mut buf) {
        Ok(len) => len,
        Err(StorageError::NotFound) => return Ok(None),
        Err(_) => return Err(ConnectivityError::NoCredentials),
    };
    let raw = super::nvs::trim_nul(&buf[..len]);
    let s = core::str::from_utf8(raw).map_err(|_| ConnectivityError::NoCredentials)?;
    let mut out = heapless::String::new();
    out.push_str(s).map_err(|_| ConnectivityError::NoCredentials)?;
    Ok(Some(out))
}

// ───────────────────────────────────────────────────────────────
// Link event mapping
// ───────────────────────────────────────────────────────────────

/// Whether the station currently holds an IP.  Shared with the event
/// loop handlers, which turn driver events into queue events through it.
pub(crate) struct IpTracker {
    has_ip: AtomicBool,
}

impl IpTracker {
    pub(crate) const fn new() -> Self {
        Self { has_ip: AtomicBool::new(false) }
    }

    /// DHCP handed out an address.
    pub(crate) fn on_ip_assigned(&self) -> Event {
        self.has_ip.store(true, Ordering::Release);
        Event::LinkUp
    }

    /// The station left the AP.  Losing an established link differs
    /// from never getting one.
    pub(crate) fn on_disconnected(&self) -> Event {
        if self.has_ip.swap(false, Ordering::AcqRel) {
            Event::LinkLost
        } else {
            Event::ConnectFailed
        }
    }

    pub(crate) fn has_ip(&self) -> bool {
        self.has_ip.load(Ordering::Acquire)
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    /// When the pending association was first seen by `poll`.
    assoc_since_ms: Option<u64>,

    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    ip: Arc<IpTracker>,
    #[cfg(target_os = "espidf")]
    _subscriptions: (EspSubscription<'static, System>, EspSubscription<'static, System>),

    /// Simulation: events the driver would have raised, in order.
    #[cfg(not(target_os = "espidf"))]
    sim_events: Vec<Event>,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_connects: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_ap_ssid: Option<heapless::String<32>>,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, ConnectivityError> {
        let wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(|e| {
            error!("WiFi: driver init failed: {}", e);
            ConnectivityError::DriverInit
        })?;

        let ip = Arc::new(IpTracker::new());

        let tracker = ip.clone();
        let wifi_sub = sysloop
            .subscribe::<WifiEvent, _>(move |event| {
                if let WifiEvent::StaDisconnected(_) = event {
                    push_event(tracker.on_disconnected());
                }
            })
            .map_err(|_| ConnectivityError::DriverInit)?;

        let tracker = ip.clone();
        let ip_sub = sysloop
            .subscribe::<IpEvent, _>(move |event| {
                if let IpEvent::DhcpIpAssigned(_) = event {
                    push_event(tracker.on_ip_assigned());
                }
            })
            .map_err(|_| ConnectivityError::DriverInit)?;

        Ok(Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            assoc_since_ms: None,
            wifi,
            ip,
            _subscriptions: (wifi_sub, ip_sub),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            assoc_since_ms: None,
            ip: Arc::new(IpTracker::new()),
            sim_events: Vec::new(),
            sim_fail_connects: 0,
            sim_ap_ssid: None,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn backoff_secs(&self) -> u32 {
        self.backoff_secs
    }

    /// Load SSID and passphrase from the `wifi` namespace.
    pub fn load_credentials(&mut self, storage: &impl StoragePort) -> Result<(), ConnectivityError> {
        let ssid: heapless::String<32> =
            read_credential(storage, KEY_SSID)?.ok_or(ConnectivityError::NoCredentials)?;
        let pass: heapless::String<64> =
            read_credential(storage, KEY_PASSWORD)?.unwrap_or_default();
        self.set_credentials(&ssid, &pass)
    }

    /// Bring up the provisioning soft AP (WPA2, channel 1).
    pub fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_credentials(ssid, password)?;
        if password.is_empty() {
            return Err(ConnectivityError::InvalidPassword);
        }
        self.platform_start_ap(ssid, password)?;
        self.state = WifiState::AccessPoint;
        info!("WiFi: soft AP '{}' up", ssid);
        Ok(())
    }

    /// After a successful connect request: `Connected` once the link is
    /// usable, otherwise wait for the driver in `Connecting`.
    fn after_connect_request(&mut self) {
        self.assoc_since_ms = None;
        if self.platform_is_connected() {
            self.state = WifiState::Connected;
            self.backoff_secs = INITIAL_BACKOFF_SECS;
        } else {
            self.state = WifiState::Connecting;
        }
    }

    fn schedule_retry(&mut self, attempt: u32, now_ms: u64) {
        let next_try_ms = now_ms + u64::from(self.backoff_secs) * 1000;
        self.state = WifiState::Reconnecting { attempt, next_try_ms };
        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });

        self.wifi.set_configuration(&config).map_err(|e| {
            warn!("WiFi: set_configuration failed: {}", e);
            ConnectivityError::ConnectionFailed
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| ConnectivityError::DriverInit)?;
        }
        // Non-blocking: completion arrives as an IP event.
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect request failed: {}", e);
            ConnectivityError::ConnectionFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_fail_connects > 0 {
            self.sim_fail_connects -= 1;
            warn!("WiFi(sim): simulated association failure");
            self.sim_events.push(self.ip.on_disconnected());
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim_events.push(self.ip.on_ip_assigned());
        info!("WiFi(sim): associated with '{}'", self.ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_ap(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        let config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: password.try_into().map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: AuthMethod::WPA2Personal,
            channel: 1,
            ..Default::default()
        });
        self.wifi.set_configuration(&config).map_err(|e| {
            warn!("WiFi: AP configuration failed: {}", e);
            ConnectivityError::AccessPointFailed
        })?;
        self.wifi.start().map_err(|e| {
            warn!("WiFi: AP start failed: {}", e);
            ConnectivityError::AccessPointFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_ap(&mut self, ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        let mut name = heapless::String::new();
        name.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.sim_ap_ssid = Some(name);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        if self.ip.has_ip() {
            self.sim_events.push(self.ip.on_disconnected());
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.ip.has_ip() && self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.ip.has_ip()
    }
}

// ── Simulation hooks ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    /// Drop the simulated link, as if the AP went away.
    pub fn sim_drop_link(&mut self) {
        self.sim_events.push(self.ip.on_disconnected());
    }

    /// Link events raised so far, oldest first.
    pub fn sim_link_events(&self) -> &[Event] {
        &self.sim_events
    }

    /// Fail the next `n` association attempts.
    pub fn sim_fail_connects(&mut self, n: u32) {
        self.sim_fail_connects = n;
    }

    /// SSID of the soft AP, if one was started.
    pub fn sim_ap_ssid(&self) -> Option<&str> {
        self.sim_ap_ssid.as_deref()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if matches!(self.state, WifiState::Connected | WifiState::AccessPoint) {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;

        match self.platform_connect() {
            Ok(()) => {
                self.after_connect_request();
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.schedule_retry(0, 0);
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Reconnecting { attempt, next_try_ms } if now_ms >= next_try_ms => {
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt + 1, self.backoff_secs);
                match self.platform_connect() {
                    Ok(()) => self.after_connect_request(),
                    Err(_) => self.schedule_retry(attempt + 1, now_ms),
                }
            }
            WifiState::Connecting => {
                if self.platform_is_connected() {
                    info!("WiFi: link up");
                    self.state = WifiState::Connected;
                    self.backoff_secs = INITIAL_BACKOFF_SECS;
                    return;
                }
                let since = *self.assoc_since_ms.get_or_insert(now_ms);
                if now_ms.saturating_sub(since) >= ASSOC_TIMEOUT_MS {
                    warn!("WiFi: association timed out");
                    self.schedule_retry(0, now_ms);
                }
            }
            WifiState::Connected if !self.platform_is_connected() => {
                warn!("WiFi: link down, scheduling reconnect");
                self.schedule_retry(0, now_ms);
            }
            _ => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_credentials(ssid, password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
