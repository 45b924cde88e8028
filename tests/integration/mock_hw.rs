//! Mock adapters for integration tests.
//!
//! Record every port call so tests can assert on the full history
//! without touching real GPIO, ADC or network.

use std::collections::{HashMap, VecDeque};

use aws_sensor::app::events::AppEvent;
use aws_sensor::app::ports::{
    AdcPort, EventSink, IndicatorPort, ShadowError, ShadowParams, ShadowPort, StorageError,
    StoragePort,
};
use aws_sensor::config::CloudConfig;
use aws_sensor::error::SensorError;

// ── MockHardware (ADC + cloud LED) ────────────────────────────

pub struct MockHardware {
    /// Queued ADC results; the last value repeats once the queue drains.
    pub readings: VecDeque<Result<f32, SensorError>>,
    last: Result<f32, SensorError>,
    pub led_on: bool,
    pub led_writes: Vec<bool>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            readings: VecDeque::new(),
            last: Err(SensorError::NotInitialised),
            led_on: false,
            led_writes: Vec::new(),
        }
    }

    pub fn with_mv(mv: f32) -> Self {
        let mut hw = Self::new();
        hw.last = Ok(mv);
        hw
    }

    pub fn push_mv(&mut self, mv: f32) {
        self.readings.push_back(Ok(mv));
    }

    pub fn push_failure(&mut self) {
        self.readings.push_back(Err(SensorError::AdcReadFailed));
    }
}

impl AdcPort for MockHardware {
    fn read_millivolts(&mut self) -> Result<f32, SensorError> {
        if let Some(next) = self.readings.pop_front() {
            if next.is_ok() {
                self.last = next;
            }
            return next;
        }
        self.last
    }
}

impl IndicatorPort for MockHardware {
    fn set_cloud_led(&mut self, on: bool) {
        self.led_on = on;
        self.led_writes.push(on);
    }
}

// ── MockShadow ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockShadow {
    pub connected: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub fail_connects: u32,
    pub fail_publishes: u32,
    /// `(thing, document)` pairs.
    pub updates: Vec<(String, String)>,
}

#[allow(dead_code)]
impl MockShadow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_document(&self) -> Option<&str> {
        self.updates.last().map(|(_, doc)| doc.as_str())
    }
}

impl ShadowPort for MockShadow {
    fn connect(&mut self, _params: &ShadowParams) -> Result<(), ShadowError> {
        if self.fail_connects > 0 {
            self.fail_connects -= 1;
            return Err(ShadowError::ConnectFailed);
        }
        self.connected = true;
        self.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ShadowError> {
        self.connected = false;
        self.disconnects += 1;
        Ok(())
    }

    fn update(&mut self, thing_name: &str, document: &str) -> Result<(), ShadowError> {
        if !self.connected {
            return Err(ShadowError::NotConnected);
        }
        if self.fail_publishes > 0 {
            self.fail_publishes -= 1;
            return Err(ShadowError::PublishFailed);
        }
        self.updates.push((thing_name.into(), document.into()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

pub fn test_params(thing: &str) -> ShadowParams {
    ShadowParams {
        cloud: CloudConfig::with_overrides(Some(thing), None, "SD-TEST01"),
        client_cert: Vec::new(),
        private_key: Vec::new(),
        root_ca: None,
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.get(&k) {
            Some(v) if v.len() > buf.len() => Err(StorageError::BufferTooSmall),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        let prefix = format!("{}::", namespace);
        self.store.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, event: &AppEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.count(event) > 0
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
