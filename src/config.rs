//! System configuration parameters
//!
//! Tunables for the sampling/publishing loop plus the cloud endpoint
//! settings.  Cloud values are read from NVS at boot; anything missing
//! falls back to the defaults below.

use core::fmt::Write;

use serde::{Deserialize, Serialize};

/// Thing name used when none is provisioned in NVS.
pub const DEFAULT_THING_NAME: &str = "aws_sensor_demo";
/// AWS region used when none is provisioned in NVS.
pub const DEFAULT_REGION: &str = "us-east-1";
/// MQTT over TLS with X.509 client authentication.
pub const DEFAULT_MQTT_PORT: u16 = 8883;

// NVS layout.  Both namespaces are wiped by a factory reset.
pub const AWS_NAMESPACE: &str = "aws";
pub const KEY_THING: &str = "thing";
pub const KEY_REGION: &str = "region";
pub const KEY_CERT: &str = "cert";
pub const KEY_PRIVATE_KEY: &str = "key";
pub const KEY_ROOT_CA: &str = "ca";
pub const WIFI_NAMESPACE: &str = "wifi";
pub const KEY_SSID: &str = "ssid";
pub const KEY_PASSWORD: &str = "pass";

pub const THING_NAME_LEN: usize = 128;
pub const REGION_LEN: usize = 16;
pub const CLIENT_ID_LEN: usize = 32;
pub const HOST_LEN: usize = 64;

/// Loop timing and gesture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interval between shadow publish attempts (milliseconds).
    pub publish_interval_ms: u32,
    /// Interval between ADC samples (milliseconds).
    pub sample_interval_ms: u32,
    /// How long the reset button must be held to wipe credentials.
    pub factory_reset_hold_ms: u32,
    /// Button debounce window.
    pub button_debounce_ms: u32,
    /// Shadow update acks older than this resolve as timed out.
    pub shadow_ack_timeout_ms: u32,
    /// Main loop period. Must be well below the other intervals so the
    /// button gesture and link events are handled promptly.
    pub loop_tick_ms: u32,
    pub adc: AdcConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 5000,
            sample_interval_ms: 5000,
            factory_reset_hold_ms: 5000,
            button_debounce_ms: 50,
            shadow_ack_timeout_ms: 10_000,
            loop_tick_ms: 100,
            adc: AdcConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reject combinations the main loop cannot honour.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.loop_tick_ms == 0 {
            return Err("loop_tick_ms must be > 0");
        }
        if self.publish_interval_ms < self.loop_tick_ms {
            return Err("publish_interval_ms must be >= loop_tick_ms");
        }
        if self.sample_interval_ms < self.loop_tick_ms {
            return Err("sample_interval_ms must be >= loop_tick_ms");
        }
        if self.button_debounce_ms >= self.factory_reset_hold_ms {
            return Err("button_debounce_ms must be < factory_reset_hold_ms");
        }
        if self.shadow_ack_timeout_ms == 0 {
            return Err("shadow_ack_timeout_ms must be > 0");
        }
        self.adc.validate()
    }
}

/// Programmable amplifier gain in front of the ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AdcGain {
    Half,
    #[default]
    One,
    Two,
}

impl AdcGain {
    pub fn factor(self) -> f32 {
        match self {
            Self::Half => 0.5,
            Self::One => 1.0,
            Self::Two => 2.0,
        }
    }
}

/// Raw-count → millivolt conversion parameters.
///
/// Used when the platform calibration scheme is unavailable:
/// `mv = raw / full_scale_counts * vref_mv / gain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdcConfig {
    /// ADC1 channel number.
    pub channel: u32,
    /// Counts at full scale (12-bit on ESP32-S3).
    pub full_scale_counts: u32,
    /// Input voltage at full scale, in millivolts (12 dB attenuation).
    pub vref_mv: f32,
    pub gain: AdcGain,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            channel: crate::pins::SENSOR_ADC_CHANNEL,
            full_scale_counts: 4096,
            vref_mv: 3100.0,
            gain: AdcGain::One,
        }
    }
}

impl AdcConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.full_scale_counts == 0 {
            return Err("adc.full_scale_counts must be > 0");
        }
        if !(self.vref_mv > 0.0 && self.vref_mv.is_finite()) {
            return Err("adc.vref_mv must be a positive number");
        }
        Ok(())
    }

    /// Linear conversion of a raw sample to millivolts.
    pub fn raw_to_millivolts(&self, raw: u16) -> f32 {
        (raw as f32 / self.full_scale_counts as f32) * self.vref_mv / self.gain.factor()
    }
}

/// Cloud endpoint identity, read from NVS with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub thing_name: heapless::String<THING_NAME_LEN>,
    pub region: heapless::String<REGION_LEN>,
    pub client_id: heapless::String<CLIENT_ID_LEN>,
    pub port: u16,
}

impl CloudConfig {
    /// Build from optional stored values, substituting defaults.
    ///
    /// Values that do not fit the fixed buffers are treated as absent.
    pub fn with_overrides(thing: Option<&str>, region: Option<&str>, client_id: &str) -> Self {
        let mut cfg = Self {
            thing_name: heapless::String::new(),
            region: heapless::String::new(),
            client_id: heapless::String::new(),
            port: DEFAULT_MQTT_PORT,
        };

        let thing = thing.filter(|t| !t.is_empty() && t.len() <= THING_NAME_LEN);
        // Both defaults fit their buffers, so the fallback pushes cannot fail.
        let _ = cfg.thing_name.push_str(thing.unwrap_or(DEFAULT_THING_NAME));

        let region = region.filter(|r| !r.is_empty() && r.len() <= REGION_LEN);
        let _ = cfg.region.push_str(region.unwrap_or(DEFAULT_REGION));

        for c in client_id.chars() {
            if cfg.client_id.push(c).is_err() {
                break;
            }
        }
        cfg
    }

    /// MQTT broker host for the configured region.
    pub fn host(&self) -> heapless::String<HOST_LEN> {
        let mut host = heapless::String::new();
        let _ = write!(host, "data.iot.{}.amazonaws.com", self.region);
        host
    }
}
