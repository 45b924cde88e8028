//! Inbound commands to the application service.
//!
//! These come from the Wi-Fi driver's event loop and from the MQTT
//! client callback, by way of the [`events`](crate::events) queue.

use crate::shadow::AckStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Station associated and got an IP address.
    LinkUp,
    /// Station lost its association.
    LinkLost,
    /// Station could not associate with the configured AP.
    ConnectFailed,
    /// Broker response on an update ack topic.
    ShadowAck(AckStatus),
}
