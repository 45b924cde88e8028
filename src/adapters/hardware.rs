//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`AdcSensor`] and the cloud [`StatusLed`], exposing them
//! through [`AdcPort`] and [`IndicatorPort`].  On non-espidf targets the
//! sensor uses its simulation backend and the LED any `embedded_hal` pin.

use embedded_hal::digital::OutputPin;

use crate::app::ports::{AdcPort, IndicatorPort};
use crate::drivers::status_led::StatusLed;
use crate::error::SensorError;
use crate::sensors::adc::AdcSensor;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<L> {
    adc: AdcSensor,
    led: StatusLed<L>,
}

impl<L: OutputPin> HardwareAdapter<L> {
    pub fn new(adc: AdcSensor, led: StatusLed<L>) -> Self {
        Self { adc, led }
    }

    pub fn cloud_led_on(&self) -> bool {
        self.led.is_on()
    }
}

// ── AdcPort implementation ────────────────────────────────────

impl<L: OutputPin> AdcPort for HardwareAdapter<L> {
    fn read_millivolts(&mut self) -> Result<f32, SensorError> {
        self.adc.read_millivolts()
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl<L: OutputPin> IndicatorPort for HardwareAdapter<L> {
    fn set_cloud_led(&mut self, on: bool) {
        self.led.set(on);
    }
}
