//! Fuzz target: ADC sample → reported shadow document
//!
//! Feeds arbitrary f32 bit patterns through `AdcReading::from_millivolts`
//! and the shadow serialiser, verifying:
//! - No panics for NaN, infinities, negatives or huge values
//! - The document always parses as JSON with a numeric `adc`
//! - The fraction never reaches one full unit
//!
//! cargo fuzz run fuzz_shadow_document

#![no_main]

use aws_sensor::reading::AdcReading;
use aws_sensor::shadow::ShadowDocument;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(bytes) = data.get(..4) else { return };
    let mv = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    let reading = AdcReading::from_millivolts(mv);
    assert!(reading.micro < 1_000_000, "micro overflow for {mv}");

    let json = ShadowDocument::reported_adc(&reading)
        .and_then(|doc| doc.to_json())
        .expect("reading must serialise");
    let v: serde_json::Value = serde_json::from_str(&json).expect("document must be JSON");
    assert!(v["state"]["reported"]["adc"].is_number(), "adc not numeric in {json}");
});
