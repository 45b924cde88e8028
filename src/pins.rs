//! GPIO / peripheral pin assignments for the sensor board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Sensor input (ADC1)
// ---------------------------------------------------------------------------

/// Analog sensor input: ADC1 channel 0, which is GPIO 1 on ESP32-S3.
/// Sampled at 12 dB attenuation (0 – 3.1 V range).
pub const SENSOR_ADC_CHANNEL: u32 = 0;

// ---------------------------------------------------------------------------
// Cloud status LED (active HIGH)
// ---------------------------------------------------------------------------

pub const CLOUD_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// User button (active-low with external pull-up)
// ---------------------------------------------------------------------------

/// BOOT button.  Holding it for the reset period erases stored credentials.
pub const BUTTON_GPIO: i32 = 0;
