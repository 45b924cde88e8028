//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (ADC, shadow client, storage, LED, event sinks)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! or the network directly.
//!
//! ## Security notes
//!
//! - The private key in [`ShadowParams`] never leaves the adapter layer
//!   except to the TLS stack; nothing in the domain logs it.
//! - **StoragePort** implementations SHOULD keep the `aws` and `wifi`
//!   namespaces on the encrypted NVS partition.

use crate::config::CloudConfig;
use crate::error::SensorError;

/// Maximum PEM certificate size (includes headers and trailing NUL).
pub const MAX_CERT_SIZE: usize = 4096;
/// Maximum PEM private key size (includes headers and trailing NUL).
pub const MAX_KEY_SIZE: usize = 2048;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait AdcPort {
    /// Sample the sensor channel and convert to millivolts.
    fn read_millivolts(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Indicator port (domain → status LED)
// ───────────────────────────────────────────────────────────────

pub trait IndicatorPort {
    /// Lit while the shadow session is up.
    fn set_cloud_led(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Shadow port (domain → MQTT shadow service)
// ───────────────────────────────────────────────────────────────

/// Everything needed to open a shadow session.
///
/// The PEM blobs live on the heap: the main task moves this value around
/// and its stack cannot hold several kilobytes of key material.
#[derive(Clone)]
pub struct ShadowParams {
    pub cloud: CloudConfig,
    /// PEM client certificate, NUL-terminated for the TLS stack.
    /// At most [`MAX_CERT_SIZE`] bytes.
    pub client_cert: Vec<u8>,
    /// PEM private key, NUL-terminated for the TLS stack.
    /// At most [`MAX_KEY_SIZE`] bytes.
    pub private_key: Vec<u8>,
    /// PEM root CA, NUL-terminated.  `None` verifies the broker against
    /// the platform certificate bundle.
    pub root_ca: Option<Vec<u8>>,
}

impl core::fmt::Debug for ShadowParams {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowParams")
            .field("cloud", &self.cloud)
            .field("client_cert_len", &self.client_cert.len())
            .field("root_ca_len", &self.root_ca.as_ref().map(|ca| ca.len()))
            .field("private_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

pub trait ShadowPort {
    /// Open the MQTT session and subscribe to the update ack topics.
    /// Blocks until the broker accepts the connection or the attempt fails.
    fn connect(&mut self, params: &ShadowParams) -> Result<(), ShadowError>;

    /// Tear down the session.  Idempotent.
    fn disconnect(&mut self) -> Result<(), ShadowError>;

    /// Publish a reported-state document for `thing_name`.
    fn update(&mut self, thing_name: &str, document: &str) -> Result<(), ShadowError>;

    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: persistent config → domain)
// ───────────────────────────────────────────────────────────────

pub trait ConfigPort {
    /// Assemble shadow connection parameters from persistent storage.
    ///
    /// Thing name and region fall back to defaults; a missing client
    /// certificate or private key is an error.
    fn load_cloud(&self, client_id: &str) -> Result<ShadowParams, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic: no partial writes on power loss.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Remove every key in `namespace`.
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowError {
    /// Operation requires an open session.
    NotConnected,
    /// The MQTT client could not be created or the broker refused us.
    ConnectFailed,
    /// No CONNACK within the connect timeout.
    ConnectTimeout,
    SubscribeFailed,
    PublishFailed,
    /// The shadow document could not be serialised.
    Serialize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingCertificate,
    MissingPrivateKey,
    /// Stored value is not valid UTF-8 / PEM.
    Corrupted(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Stored value is larger than the caller's buffer.
    BufferTooSmall,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ShadowError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::ConnectTimeout => write!(f, "connect timed out"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::Serialize => write!(f, "document serialisation failed"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingCertificate => write!(f, "client certificate not provisioned"),
            Self::MissingPrivateKey => write!(f, "private key not provisioned"),
            Self::Corrupted(what) => write!(f, "stored {} is corrupted", what),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
