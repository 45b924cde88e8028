//! One-shot hardware peripheral initialization.
//!
//! Creates the ADC1 oneshot unit for the sensor channel and, where the
//! chip supports it, a curve-fitting calibration scheme, using raw
//! ESP-IDF sys calls.  Called once from `main()` before the event loop
//! starts.  The button and LED go through `PinDriver` instead.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{info, warn};

use crate::config::AdcConfig;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    AdcChannelFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::AdcChannelFailed(rc) => write!(f, "ADC1 channel config failed (rc={})", rc),
        }
    }
}

// ── ADC (oneshot) ─────────────────────────────────────────────

/// Owned ADC1 oneshot unit plus optional calibration handle.
#[cfg(target_os = "espidf")]
pub struct AdcUnit {
    handle: adc_oneshot_unit_handle_t,
    cali: Option<adc_cali_handle_t>,
    channel: adc_channel_t,
}

/// Simulated ADC unit; reads come from the sensor's injection hooks.
#[cfg(not(target_os = "espidf"))]
pub struct AdcUnit {
    channel: u32,
}

#[cfg(target_os = "espidf")]
pub fn init_adc(cfg: &AdcConfig) -> Result<AdcUnit, HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
    // SAFETY: called once from main() before the event loop; `handle` is a
    // valid out-pointer for the duration of the call.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    // SAFETY: `handle` was just created by adc_oneshot_new_unit.
    let ret = unsafe { adc_oneshot_config_channel(handle, cfg.channel, &chan_cfg) };
    if ret != ESP_OK as i32 {
        // SAFETY: handle is valid and not used after deletion.
        unsafe { adc_oneshot_del_unit(handle) };
        return Err(HwInitError::AdcChannelFailed(ret));
    }

    let cali_cfg = adc_cali_curve_fitting_config_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        chan: cfg.channel,
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let mut cali: adc_cali_handle_t = core::ptr::null_mut();
    // SAFETY: `cali` is a valid out-pointer; the config outlives the call.
    let ret = unsafe { adc_cali_create_scheme_curve_fitting(&cali_cfg, &mut cali) };
    let cali = if ret == ESP_OK as i32 {
        info!("hw_init: ADC1 CH{} calibrated (curve fitting)", cfg.channel);
        Some(cali)
    } else {
        warn!(
            "hw_init: ADC1 calibration unavailable (rc={}), using linear conversion",
            ret
        );
        None
    };

    Ok(AdcUnit { handle, cali, channel: cfg.channel })
}

#[cfg(not(target_os = "espidf"))]
pub fn init_adc(cfg: &AdcConfig) -> Result<AdcUnit, HwInitError> {
    log::info!("hw_init(sim): ADC1 CH{} simulated", cfg.channel);
    Ok(AdcUnit { channel: cfg.channel })
}

#[cfg(target_os = "espidf")]
impl AdcUnit {
    /// One raw conversion on the configured channel.
    pub fn read_raw(&mut self) -> Option<u16> {
        let mut raw: i32 = 0;
        // SAFETY: handle is owned by self and valid until drop.
        let ret = unsafe { adc_oneshot_read(self.handle, self.channel, &mut raw) };
        if ret != ESP_OK as i32 {
            return None;
        }
        Some(raw.max(0) as u16)
    }

    /// Calibrated input voltage in millivolts, if a scheme is active.
    pub fn calibrated_mv(&self, raw: u16) -> Option<i32> {
        let cali = self.cali?;
        let mut mv: i32 = 0;
        // SAFETY: cali handle is owned by self and valid until drop.
        let ret = unsafe { adc_cali_raw_to_voltage(cali, i32::from(raw), &mut mv) };
        (ret == ESP_OK as i32).then_some(mv)
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }
}

#[cfg(target_os = "espidf")]
impl Drop for AdcUnit {
    fn drop(&mut self) {
        // SAFETY: handles were created in init_adc and are not used again.
        unsafe {
            if let Some(cali) = self.cali.take() {
                adc_cali_delete_scheme_curve_fitting(cali);
            }
            adc_oneshot_del_unit(self.handle);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl AdcUnit {
    pub fn read_raw(&mut self) -> Option<u16> {
        crate::sensors::adc::sim_read_raw()
    }

    /// The simulator has no calibration scheme.
    pub fn calibrated_mv(&self, _raw: u16) -> Option<i32> {
        None
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }
}
