//! Fixed-point ADC reading.
//!
//! The shadow payload carries the reading as `<integer>.<fraction>` with
//! six fractional digits.  Splitting the value once, at sample time, keeps
//! what gets logged, compared and published identical.

use core::fmt;

use serde::{Deserialize, Serialize};

const MICRO_PER_UNIT: f64 = 1_000_000.0;

/// A millivolt reading split into integer and micro-millivolt parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdcReading {
    pub integer: u32,
    /// Fractional part in millionths, always `< 1_000_000`.
    pub micro: u32,
}

impl AdcReading {
    /// Split a millivolt value.  Negative and non-finite inputs clamp to 0.
    pub fn from_millivolts(mv: f32) -> Self {
        if !mv.is_finite() || mv <= 0.0 {
            return Self::default();
        }
        let mv = f64::from(mv).min(f64::from(u32::MAX));
        let integer = mv.trunc();
        // Round the fraction, carrying into the integer part at 0.9999995+.
        let mut micro = ((mv - integer) * MICRO_PER_UNIT).round() as u32;
        let mut integer = integer as u32;
        if micro >= 1_000_000 {
            micro = 0;
            integer = integer.saturating_add(1);
        }
        Self { integer, micro }
    }

    pub fn as_millivolts(&self) -> f64 {
        f64::from(self.integer) + f64::from(self.micro) / MICRO_PER_UNIT
    }

    /// Change test used to decide whether a new shadow update is due.
    ///
    /// Only the integer millivolt part counts; fractional jitter does not
    /// produce a publish.
    pub fn differs_from(&self, other: &Self) -> bool {
        self.integer != other.integer
    }
}

impl fmt::Display for AdcReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.integer, self.micro)
    }
}
