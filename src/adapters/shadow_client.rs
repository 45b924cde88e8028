//! AWS IoT device shadow client over MQTT.
//!
//! Implements [`ShadowPort`] on top of the ESP-IDF MQTT client with
//! X.509 mutual TLS on port 8883.
//!
//! ```text
//!   AppService ──update()──▶ ShadowClient ──publish QoS1──▶ $aws/things/<t>/shadow/update
//!                                 ▲
//!   events queue ◀── MQTT cb ─────┘  .../update/accepted | .../update/rejected
//! ```
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with a callback that
//!   tracks the connection and forwards ack topics as [`Event`]s.
//! - **all other targets**: an in-memory recorder for host-side tests.
//!
//! The ESP-IDF client keeps raw pointers to the PEM buffers for the
//! lifetime of the session, so the identity is leaked once and reused
//! across reconnects.
//!
//! ## Broker reconnects
//!
//! The MQTT task reconnects on its own after a transport drop, with a
//! clean session.  Subscriptions do not survive that, so every
//! `Connected` after the first one marks the session for resubscription
//! and the next [`ShadowPort::update`] re-issues both ack subscriptions
//! before publishing.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use log::{info, warn};
use std::sync::Arc;

use crate::app::ports::{ShadowError, ShadowParams, ShadowPort};
use crate::events::Event;
use crate::shadow::{AckStatus, topics};

#[cfg(target_os = "espidf")]
use crate::events::push_event;
#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::tls::X509;

/// How long `connect` waits for the broker's CONNACK.
pub const CONNECT_TIMEOUT_MS: u32 = 10_000;

const CONN_PENDING: u8 = 0;
const CONN_UP: u8 = 1;
const CONN_DOWN: u8 = 2;

// ───────────────────────────────────────────────────────────────
// Session flags
// ───────────────────────────────────────────────────────────────

/// Connection state shared with the MQTT callback task.
pub(crate) struct SessionFlags {
    state: AtomicU8,
    /// `Connected` events seen since [`begin`](Self::begin).
    sessions: AtomicU32,
    resubscribe: AtomicBool,
}

impl SessionFlags {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(CONN_DOWN),
            sessions: AtomicU32::new(0),
            resubscribe: AtomicBool::new(false),
        }
    }

    /// A fresh client is about to be created.
    pub(crate) fn begin(&self) {
        self.sessions.store(0, Ordering::Release);
        self.resubscribe.store(false, Ordering::Release);
        self.state.store(CONN_PENDING, Ordering::Release);
    }

    pub(crate) fn on_connected(&self) {
        if self.sessions.fetch_add(1, Ordering::AcqRel) > 0 {
            self.resubscribe.store(true, Ordering::Release);
        }
        self.state.store(CONN_UP, Ordering::Release);
    }

    pub(crate) fn on_disconnected(&self) {
        self.state.store(CONN_DOWN, Ordering::Release);
    }

    pub(crate) fn is_up(&self) -> bool {
        self.state.load(Ordering::Acquire) == CONN_UP
    }

    /// True once per broker reconnect.
    pub(crate) fn take_resubscribe(&self) -> bool {
        self.resubscribe.swap(false, Ordering::AcqRel)
    }

    /// Put back a resubscription that could not be completed.
    pub(crate) fn request_resubscribe(&self) {
        self.resubscribe.store(true, Ordering::Release);
    }
}

/// Map an inbound MQTT topic to a queue event.  Anything that is not
/// this thing's update ack is ignored.
pub(crate) fn ack_event(thing: &str, topic: &str) -> Option<Event> {
    match topics::classify(thing, topic)? {
        AckStatus::Accepted => Some(Event::ShadowAccepted),
        AckStatus::Rejected => Some(Event::ShadowRejected),
        _ => None,
    }
}

/// Session identity pinned for the life of the program.
#[cfg(target_os = "espidf")]
struct PinnedIdentity {
    url: String,
    client_id: String,
    thing_name: String,
    client_cert: Vec<u8>,
    private_key: Vec<u8>,
    root_ca: Option<Vec<u8>>,
}

#[cfg(target_os = "espidf")]
impl PinnedIdentity {
    fn from_params(params: &ShadowParams) -> Self {
        Self {
            url: format!("mqtts://{}:{}", params.cloud.host(), params.cloud.port),
            client_id: params.cloud.client_id.as_str().into(),
            thing_name: params.cloud.thing_name.as_str().into(),
            client_cert: params.client_cert.clone(),
            private_key: params.private_key.clone(),
            root_ca: params.root_ca.clone(),
        }
    }

    fn matches(&self, params: &ShadowParams) -> bool {
        self.client_id == params.cloud.client_id.as_str()
            && self.thing_name == params.cloud.thing_name.as_str()
            && self.client_cert == params.client_cert
            && self.private_key == params.private_key
            && self.root_ca == params.root_ca
    }
}

pub struct ShadowClient {
    flags: Arc<SessionFlags>,
    connects: u32,

    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    identity: Option<&'static PinnedIdentity>,

    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, String)>,
    #[cfg(not(target_os = "espidf"))]
    subscriptions: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    fail_next_connect: bool,
    #[cfg(not(target_os = "espidf"))]
    fail_next_publish: bool,
    #[cfg(not(target_os = "espidf"))]
    fail_next_subscribe: bool,
}

impl Default for ShadowClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowClient {
    pub fn new() -> Self {
        Self {
            flags: Arc::new(SessionFlags::new()),
            connects: 0,

            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            identity: None,

            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            subscriptions: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            fail_next_connect: false,
            #[cfg(not(target_os = "espidf"))]
            fail_next_publish: false,
            #[cfg(not(target_os = "espidf"))]
            fail_next_subscribe: false,
        }
    }

    /// Successful connects since boot.
    pub fn connect_count(&self) -> u32 {
        self.connects
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn pin_identity(&mut self, params: &ShadowParams) -> &'static PinnedIdentity {
        match self.identity {
            Some(id) if id.matches(params) => id,
            _ => {
                if self.identity.is_some() {
                    warn!("shadow: identity changed, pinning new copy");
                }
                let id: &'static PinnedIdentity =
                    Box::leak(Box::new(PinnedIdentity::from_params(params)));
                self.identity = Some(id);
                id
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, params: &ShadowParams) -> Result<(), ShadowError> {
        let id = self.pin_identity(params);

        let conf = MqttClientConfiguration {
            client_id: Some(id.client_id.as_str()),
            keep_alive_interval: Some(core::time::Duration::from_secs(30)),
            client_certificate: Some(X509::pem_until_nul(&id.client_cert)),
            private_key: Some(X509::pem_until_nul(&id.private_key)),
            server_certificate: id.root_ca.as_deref().map(X509::pem_until_nul),
            crt_bundle_attach: if id.root_ca.is_none() {
                Some(esp_idf_svc::sys::esp_crt_bundle_attach)
            } else {
                None
            },
            ..Default::default()
        };

        self.flags.begin();
        let flags = self.flags.clone();
        let thing = id.thing_name.as_str();

        let client = EspMqttClient::new_cb(&id.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => flags.on_connected(),
            EventPayload::Disconnected => flags.on_disconnected(),
            EventPayload::Error(e) => warn!("shadow: mqtt error {:?}", e),
            EventPayload::Received { topic: Some(topic), .. } => {
                if let Some(ev) = ack_event(thing, topic) {
                    push_event(ev);
                }
            }
            _ => {}
        })
        .map_err(|e| {
            warn!("shadow: client init failed: {}", e);
            ShadowError::ConnectFailed
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while !self.flags.is_up() {
            if waited >= CONNECT_TIMEOUT_MS {
                self.client = None;
                return Err(ShadowError::ConnectTimeout);
            }
            std::thread::sleep(core::time::Duration::from_millis(100));
            waited += 100;
        }

        if let Err(e) = self.platform_subscribe(thing) {
            self.client = None;
            return Err(e);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, params: &ShadowParams) -> Result<(), ShadowError> {
        if core::mem::take(&mut self.fail_next_connect) {
            warn!("shadow(sim): simulated connect failure");
            return Err(ShadowError::ConnectFailed);
        }
        info!("shadow(sim): connected to {}", params.cloud.host());
        self.flags.begin();
        self.flags.on_connected();
        self.platform_subscribe(&params.cloud.thing_name)
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, thing: &str) -> Result<(), ShadowError> {
        let client = self.client.as_mut().ok_or(ShadowError::NotConnected)?;
        for topic in [topics::update_accepted(thing), topics::update_rejected(thing)] {
            if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce) {
                warn!("shadow: subscribe to {} failed: {}", topic, e);
                return Err(ShadowError::SubscribeFailed);
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, thing: &str) -> Result<(), ShadowError> {
        if core::mem::take(&mut self.fail_next_subscribe) {
            return Err(ShadowError::SubscribeFailed);
        }
        self.subscriptions.push(topics::update_accepted(thing).as_str().into());
        self.subscriptions.push(topics::update_rejected(thing).as_str().into());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client stops the MQTT task and closes the socket.
        self.client = None;
        self.flags.on_disconnected();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.flags.on_disconnected();
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, document: &str) -> Result<(), ShadowError> {
        let client = self.client.as_mut().ok_or(ShadowError::NotConnected)?;
        client
            .publish(topic, QoS::AtLeastOnce, false, document.as_bytes())
            .map(|_| ())
            .map_err(|e| {
                warn!("shadow: publish failed: {}", e);
                ShadowError::PublishFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, document: &str) -> Result<(), ShadowError> {
        if core::mem::take(&mut self.fail_next_publish) {
            return Err(ShadowError::PublishFailed);
        }
        self.published.push((topic.into(), document.into()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.client.is_some() && self.flags.is_up()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.flags.is_up()
    }
}

// ── Simulation hooks ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl ShadowClient {
    pub fn sim_fail_next_connect(&mut self) {
        self.fail_next_connect = true;
    }

    pub fn sim_fail_next_publish(&mut self) {
        self.fail_next_publish = true;
    }

    pub fn sim_fail_next_subscribe(&mut self) {
        self.fail_next_subscribe = true;
    }

    /// The MQTT task dropped the transport and came back on its own.
    pub fn sim_broker_reconnect(&mut self) {
        self.flags.on_disconnected();
        self.flags.on_connected();
    }

    /// `(topic, document)` pairs published so far.
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }

    /// Topic filters subscribed so far, in order.
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }
}

// ── ShadowPort ────────────────────────────────────────────────

impl ShadowPort for ShadowClient {
    fn connect(&mut self, params: &ShadowParams) -> Result<(), ShadowError> {
        if self.platform_is_connected() {
            self.platform_disconnect();
        }
        self.platform_connect(params)?;
        self.connects += 1;
        info!("shadow: session up ({} connects since boot)", self.connects);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ShadowError> {
        self.platform_disconnect();
        info!("shadow: session closed");
        Ok(())
    }

    fn update(&mut self, thing_name: &str, document: &str) -> Result<(), ShadowError> {
        if !self.platform_is_connected() {
            return Err(ShadowError::NotConnected);
        }
        if self.flags.take_resubscribe() {
            info!("shadow: broker session resumed, resubscribing");
            if let Err(e) = self.platform_subscribe(thing_name) {
                self.flags.request_resubscribe();
                return Err(e);
            }
        }
        let topic = topics::update(thing_name);
        self.platform_publish(&topic, document)
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }
}
