//! Analog sensor input.
//!
//! Reads one ADC1 channel through the oneshot unit created by
//! [`hw_init::init_adc`](crate::drivers::hw_init::init_adc) and converts
//! the sample to millivolts at the sensor, undoing the front-end gain.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: oneshot read, curve-fitting calibration when available,
//! otherwise the linear conversion from [`AdcConfig`].
//! On host/test: reads from a static `AtomicU16` for injection.

use crate::config::AdcConfig;
use crate::drivers::hw_init::AdcUnit;
use crate::error::SensorError;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

#[cfg(not(target_os = "espidf"))]
static SIM_ADC_RAW: AtomicU16 = AtomicU16::new(0);
#[cfg(not(target_os = "espidf"))]
static SIM_FAIL_NEXT: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc_raw(raw: u16) {
    SIM_ADC_RAW.store(raw, Ordering::Relaxed);
}

/// Make the next simulated read fail.
#[cfg(not(target_os = "espidf"))]
pub fn sim_fail_next() {
    SIM_FAIL_NEXT.store(true, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub(crate) fn sim_read_raw() -> Option<u16> {
    if SIM_FAIL_NEXT.swap(false, Ordering::Relaxed) {
        return None;
    }
    Some(SIM_ADC_RAW.load(Ordering::Relaxed))
}

pub struct AdcSensor {
    unit: Option<AdcUnit>,
    cfg: AdcConfig,
}

impl AdcSensor {
    pub fn new(unit: AdcUnit, cfg: AdcConfig) -> Self {
        Self { unit: Some(unit), cfg }
    }

    /// A sensor whose ADC could not be initialised.  Every read fails.
    pub fn unavailable(cfg: AdcConfig) -> Self {
        Self { unit: None, cfg }
    }

    pub fn read_millivolts(&mut self) -> Result<f32, SensorError> {
        let unit = self.unit.as_mut().ok_or(SensorError::NotInitialised)?;

        let raw = unit.read_raw().ok_or(SensorError::AdcReadFailed)?;

        let mv = match unit.calibrated_mv(raw) {
            Some(mv) => mv as f32 / self.cfg.gain.factor(),
            None => self.cfg.raw_to_millivolts(raw),
        };
        Ok(mv)
    }
}
