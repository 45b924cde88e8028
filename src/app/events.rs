//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder, ...).

use crate::reading::AdcReading;
use crate::shadow::AckStatus;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// First shadow session established.
    CloudStarted,
    /// Link lost; shadow session torn down.
    CloudDropped,
    /// Shadow session re-established after the link came back.
    CloudReconnected,
    /// Connect or reconnect failed; the cloud task has stopped.
    CloudHalted,

    /// A new ADC reading was taken.
    Sampled(AdcReading),
    /// The ADC read failed; the previous reading is kept.
    SampleFailed,

    /// A shadow update was sent.
    Published { reading: AdcReading },
    /// The shadow update could not be sent; retried next cycle.
    PublishFailed,
    /// A publish cycle ran without sending anything.
    PublishSkipped(SkipReason),
    /// The broker answered (or failed to answer) an update.
    ShadowAck(AckStatus),

    /// Credentials erased; the device is about to restart.
    FactoryReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Link is down or the session is being re-established.
    Offline,
    /// No sample has been taken yet.
    NoReading,
    /// Reading matches the last published value.
    Unchanged,
}
