//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::{AppEvent, SkipReason};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::CloudStarted => info!("CLOUD | started"),
            AppEvent::CloudDropped => warn!("CLOUD | dropped (link lost)"),
            AppEvent::CloudReconnected => info!("CLOUD | reconnected"),
            AppEvent::CloudHalted => warn!("CLOUD | halted, sampling continues"),
            AppEvent::Sampled(r) => debug!("ADC   | {} mV", r),
            AppEvent::SampleFailed => warn!("ADC   | read failed"),
            AppEvent::Published { reading } => info!("PUB   | adc={}", reading),
            AppEvent::PublishFailed => warn!("PUB   | failed, will retry"),
            AppEvent::PublishSkipped(SkipReason::Unchanged) => debug!("PUB   | unchanged"),
            AppEvent::PublishSkipped(reason) => debug!("PUB   | skipped ({:?})", reason),
            AppEvent::ShadowAck(status) => info!("ACK   | {}", status),
            AppEvent::FactoryReset => warn!("RESET | credentials erased"),
        }
    }
}
