//! Soft-AP provisioning server.
//!
//! An unprovisioned device starts the `aws_starter` access point and
//! serves a small JSON API that writes the `wifi` and `aws` namespaces.
//! Once the station credentials and the device identity are stored, a
//! restart request reboots into normal operation.
//!
//! | Method | Path           | Body                                           |
//! |--------|----------------|------------------------------------------------|
//! | GET    | `/api/status`  |                                                |
//! | POST   | `/api/wifi`    | `{"ssid": "...", "pass": "..."}`               |
//! | POST   | `/api/aws`     | any of `thing`, `region`, `cert`, `key`, `ca`  |
//! | POST   | `/api/restart` |                                                |
//!
//! Every request is validated in full before anything is written, so a
//! rejected request leaves NVS untouched.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspHttpServer` routes each path to
//!   [`handle`].
//! - **all other targets**: [`ProvisioningServer::sim_request`] feeds
//!   [`handle`] directly.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::adapters::wifi::{ConnectivityError, validate_credentials};
use crate::app::ports::{MAX_CERT_SIZE, MAX_KEY_SIZE, StorageError, StoragePort};
use crate::config::{
    AWS_NAMESPACE, KEY_CERT, KEY_PASSWORD, KEY_PRIVATE_KEY, KEY_REGION, KEY_ROOT_CA, KEY_SSID,
    KEY_THING, REGION_LEN, THING_NAME_LEN, WIFI_NAMESPACE,
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::{Headers, Method};
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::{Read, Write};

/// Soft-AP network name.
pub const AP_SSID: &str = "aws_starter";
/// Soft-AP WPA2 passphrase.
pub const AP_PASSPHRASE: &str = "marvellwm";

/// Largest accepted request body: a certificate, a CA and a key with
/// JSON escaping.
pub const MAX_BODY_LEN: usize = 12 * 1024;

const PEM_BEGIN: &str = "-----BEGIN ";

// ───────────────────────────────────────────────────────────────
// Request bodies
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WifiProvision {
    pub ssid: String,
    /// Empty for an open network.
    #[serde(default)]
    pub pass: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsProvision {
    #[serde(default)]
    pub thing: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub cert: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub ca: Option<String>,
}

impl AwsProvision {
    fn is_empty(&self) -> bool {
        self.thing.is_none()
            && self.region.is_none()
            && self.cert.is_none()
            && self.key.is_none()
            && self.ca.is_none()
    }
}

/// Which values are present in NVS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProvisioningStatus {
    pub wifi: bool,
    pub thing: bool,
    pub region: bool,
    pub cert: bool,
    pub key: bool,
    pub ca: bool,
}

impl ProvisioningStatus {
    pub fn read(storage: &impl StoragePort) -> Self {
        Self {
            wifi: storage.exists(WIFI_NAMESPACE, KEY_SSID),
            thing: storage.exists(AWS_NAMESPACE, KEY_THING),
            region: storage.exists(AWS_NAMESPACE, KEY_REGION),
            cert: storage.exists(AWS_NAMESPACE, KEY_CERT),
            key: storage.exists(AWS_NAMESPACE, KEY_PRIVATE_KEY),
            ca: storage.exists(AWS_NAMESPACE, KEY_ROOT_CA),
        }
    }

    /// Enough to join the network and authenticate to the broker.  Thing
    /// name, region and CA have defaults.
    pub fn is_complete(&self) -> bool {
        self.wifi && self.cert && self.key
    }
}

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// Body is not the expected JSON object.
    BadRequest(&'static str),
    /// Station credentials rejected.
    Wifi(ConnectivityError),
    /// A field has an invalid value.
    Invalid(&'static str),
    /// A field or the body is larger than the device accepts.
    TooLarge(&'static str),
    /// Restart requested before the device can run.
    Incomplete,
    Storage(StorageError),
}

impl ProvisionError {
    /// HTTP status for the reply.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Wifi(_) | Self::Invalid(_) => 400,
            Self::Incomplete => 409,
            Self::TooLarge(_) => 413,
            Self::Storage(_) => 500,
        }
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(what) => write!(f, "malformed request: {what}"),
            Self::Wifi(e) => write!(f, "{e}"),
            Self::Invalid(what) => write!(f, "invalid {what}"),
            Self::TooLarge(what) => write!(f, "{what} too large"),
            Self::Incomplete => write!(f, "wifi credentials, certificate and key are required"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl From<StorageError> for ProvisionError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ───────────────────────────────────────────────────────────────
// Validation and writes
// ───────────────────────────────────────────────────────────────

/// AWS IoT thing names: letters, digits, `:`, `_` and `-`.
fn validate_thing(thing: &str) -> Result<(), ProvisionError> {
    let ok = (1..=THING_NAME_LEN).contains(&thing.len())
        && thing.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'-'));
    if ok { Ok(()) } else { Err(ProvisionError::Invalid("thing")) }
}

/// Region codes such as `eu-west-1`.
fn validate_region(region: &str) -> Result<(), ProvisionError> {
    let ok = (1..=REGION_LEN).contains(&region.len())
        && region.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if ok { Ok(()) } else { Err(ProvisionError::Invalid("region")) }
}

/// PEM text that fits `limit` once NUL-terminated.
fn validate_pem(pem: &str, what: &'static str, limit: usize) -> Result<(), ProvisionError> {
    if !pem.starts_with(PEM_BEGIN) {
        return Err(ProvisionError::Invalid(what));
    }
    if pem.len() >= limit {
        return Err(ProvisionError::TooLarge(what));
    }
    Ok(())
}

/// Store station credentials from a `/api/wifi` body.
pub fn apply_wifi(storage: &mut impl StoragePort, body: &[u8]) -> Result<(), ProvisionError> {
    let req: WifiProvision = serde_json::from_slice(body)
        .map_err(|_| ProvisionError::BadRequest("expected {\"ssid\", \"pass\"}"))?;
    validate_credentials(&req.ssid, &req.pass).map_err(ProvisionError::Wifi)?;

    storage.write(WIFI_NAMESPACE, KEY_SSID, req.ssid.as_bytes())?;
    if req.pass.is_empty() {
        storage.delete(WIFI_NAMESPACE, KEY_PASSWORD)?;
    } else {
        storage.write(WIFI_NAMESPACE, KEY_PASSWORD, req.pass.as_bytes())?;
    }
    info!("Provisioning: station credentials stored (SSID='{}')", req.ssid);
    Ok(())
}

/// Store the fields present in an `/api/aws` body.
pub fn apply_aws(storage: &mut impl StoragePort, body: &[u8]) -> Result<(), ProvisionError> {
    let req: AwsProvision = serde_json::from_slice(body)
        .map_err(|_| ProvisionError::BadRequest("expected an object of thing/region/cert/key/ca"))?;
    if req.is_empty() {
        return Err(ProvisionError::BadRequest("no fields"));
    }

    if let Some(thing) = &req.thing {
        validate_thing(thing)?;
    }
    if let Some(region) = &req.region {
        validate_region(region)?;
    }
    if let Some(cert) = &req.cert {
        validate_pem(cert, "certificate", MAX_CERT_SIZE)?;
    }
    if let Some(key) = &req.key {
        validate_pem(key, "private key", MAX_KEY_SIZE)?;
    }
    if let Some(ca) = &req.ca {
        validate_pem(ca, "root CA", MAX_CERT_SIZE)?;
    }

    let fields = [
        (KEY_THING, &req.thing),
        (KEY_REGION, &req.region),
        (KEY_CERT, &req.cert),
        (KEY_PRIVATE_KEY, &req.key),
        (KEY_ROOT_CA, &req.ca),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            storage.write(AWS_NAMESPACE, key, value.as_bytes())?;
            info!("Provisioning: stored aws/{} ({}B)", key, value.len());
        }
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Routing
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Status,
    Wifi,
    Aws,
    Restart,
}

/// Status code and JSON body of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body: body.to_string() }
    }

    fn error(e: &ProvisionError) -> Self {
        Self { status: e.status(), body: serde_json::json!({ "error": e.to_string() }).to_string() }
    }
}

/// Serve one request.  `restart` is raised once a restart is accepted.
pub fn handle(
    route: Route,
    body: &[u8],
    storage: &mut impl StoragePort,
    restart: &AtomicBool,
) -> Reply {
    if body.len() > MAX_BODY_LEN {
        return Reply::error(&ProvisionError::TooLarge("body"));
    }

    let result = match route {
        Route::Status => {
            let status = ProvisioningStatus::read(storage);
            return Reply::ok(serde_json::json!({
                "provisioned": status.is_complete(),
                "stored": status,
            }));
        }
        Route::Wifi => apply_wifi(storage, body),
        Route::Aws => apply_aws(storage, body),
        Route::Restart => {
            if ProvisioningStatus::read(storage).is_complete() {
                restart.store(true, Ordering::Release);
                info!("Provisioning: restart accepted");
                Ok(())
            } else {
                Err(ProvisionError::Incomplete)
            }
        }
    };

    match result {
        Ok(()) => Reply::ok(serde_json::json!({ "ok": true })),
        Err(e) => {
            warn!("Provisioning: {:?} rejected: {}", route, e);
            Reply::error(&e)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Server
// ───────────────────────────────────────────────────────────────

pub struct ProvisioningServer<S> {
    restart: Arc<AtomicBool>,

    #[cfg(target_os = "espidf")]
    _server: EspHttpServer<'static>,
    #[cfg(target_os = "espidf")]
    _storage: core::marker::PhantomData<S>,

    #[cfg(not(target_os = "espidf"))]
    storage: Arc<Mutex<S>>,
}

impl<S: StoragePort + Send + 'static> ProvisioningServer<S> {
    #[cfg(target_os = "espidf")]
    pub fn start(storage: Arc<Mutex<S>>) -> anyhow::Result<Self> {
        let restart = Arc::new(AtomicBool::new(false));
        let mut server = EspHttpServer::new(&HttpConfiguration {
            stack_size: 16 * 1024,
            ..Default::default()
        })?;

        let routes = [
            ("/api/status", Method::Get, Route::Status),
            ("/api/wifi", Method::Post, Route::Wifi),
            ("/api/aws", Method::Post, Route::Aws),
            ("/api/restart", Method::Post, Route::Restart),
        ];
        for (path, method, route) in routes {
            let storage = storage.clone();
            let restart = restart.clone();
            server.fn_handler::<anyhow::Error, _>(path, method, move |mut req| {
                let len = req.content_len().unwrap_or(0) as usize;
                let reply = if len > MAX_BODY_LEN {
                    Reply::error(&ProvisionError::TooLarge("body"))
                } else {
                    let mut body = vec![0u8; len];
                    match req.read_exact(&mut body) {
                        Ok(()) => {
                            let mut guard = storage
                                .lock()
                                .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
                            handle(route, &body, &mut *guard, &restart)
                        }
                        Err(_) => Reply::error(&ProvisionError::BadRequest("truncated body")),
                    }
                };
                req.into_response(
                    reply.status,
                    None,
                    &[("Content-Type", "application/json; charset=utf-8")],
                )?
                .write_all(reply.body.as_bytes())?;
                Ok(())
            })?;
        }

        info!("Provisioning: HTTP server listening");
        Ok(Self { restart, _server: server, _storage: core::marker::PhantomData })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(storage: Arc<Mutex<S>>) -> anyhow::Result<Self> {
        Ok(Self { restart: Arc::new(AtomicBool::new(false)), storage })
    }

    /// A client asked for a reboot after completing provisioning.
    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::Acquire)
    }
}

// ── Simulation hooks ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl<S: StoragePort + Send + 'static> ProvisioningServer<S> {
    /// Serve one request as the HTTP server would.
    pub fn sim_request(&self, route: Route, body: &[u8]) -> Reply {
        match self.storage.lock() {
            Ok(mut guard) => handle(route, body, &mut *guard, &self.restart),
            Err(_) => Reply::error(&ProvisionError::Storage(StorageError::IoError)),
        }
    }
}
