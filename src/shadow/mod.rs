//! Device shadow document, topics and update acknowledgement tracking.
//!
//! Only the `reported` side of the shadow is written; the device never
//! reads `desired` state.

pub mod ack;
pub mod topics;

use serde::Serialize;
use serde_json::value::RawValue;

use crate::reading::AdcReading;

pub use ack::{AckStatus, AckTracker};

/// Property name of the reading inside `state.reported`.
pub const ADC_PROPERTY: &str = "adc";

/// `{"state":{"reported":{"adc":<integer>.<fraction>}}}`
#[derive(Debug, Serialize)]
pub struct ShadowDocument {
    state: State,
}

#[derive(Debug, Serialize)]
struct State {
    reported: Reported,
}

#[derive(Debug, Serialize)]
struct Reported {
    // Raw so the six fractional digits survive verbatim instead of going
    // through f64 formatting.
    adc: Box<RawValue>,
}

impl ShadowDocument {
    pub fn reported_adc(reading: &AdcReading) -> Result<Self, serde_json::Error> {
        let adc = RawValue::from_string(reading.to_string())?;
        Ok(Self {
            state: State {
                reported: Reported { adc },
            },
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
