//! Callback-driven event system.
//!
//! Events are produced by:
//! - the Wi-Fi / IP event loop (link up, link lost, association failure)
//! - the MQTT client callback (shadow update accepted / rejected)
//! - the button driver (5 s hold)
//!
//! Events are consumed by the main loop, which turns them into
//! [`AppCommand`](crate::app::commands::AppCommand)s one at a time.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Wi-Fi event │────▶│              │     │              │
//! │ MQTT cb     │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Button      │────▶│  (channel)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The producers run on ESP-IDF system tasks, so the queue is an
//! `embassy-sync` channel guarded by a critical section rather than a
//! single-producer ring.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::AppCommand;
use crate::shadow::AckStatus;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // ── Connectivity ──────────────────────────────────────
    /// Station got an IP address.
    LinkUp,
    /// Station disconnected from the AP.
    LinkLost,
    /// Association with the AP failed.
    ConnectFailed,

    // ── Shadow ────────────────────────────────────────────
    ShadowAccepted,
    ShadowRejected,

    // ── User input ────────────────────────────────────────
    /// Button held for the factory-reset period.
    ButtonLongPress,
}

impl Event {
    /// Map to the application command it carries, if any.
    /// `ButtonLongPress` is handled by the main loop directly.
    pub fn to_command(self) -> Option<AppCommand> {
        match self {
            Self::LinkUp => Some(AppCommand::LinkUp),
            Self::LinkLost => Some(AppCommand::LinkLost),
            Self::ConnectFailed => Some(AppCommand::ConnectFailed),
            Self::ShadowAccepted => Some(AppCommand::ShadowAck(AckStatus::Accepted)),
            Self::ShadowRejected => Some(AppCommand::ShadowAck(AckStatus::Rejected)),
            Self::ButtonLongPress => None,
        }
    }
}

/// Bounded multi-producer event queue.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self { channel: Channel::new() }
    }

    /// Push an event.  Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        self.channel.try_send(event).is_ok()
    }

    /// Pop the oldest pending event.
    pub fn pop(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Global queue ──────────────────────────────────────────────
//
// Callbacks registered with ESP-IDF are `'static`, so producers reach
// the queue through this static rather than a captured handle.

static EVENTS: EventQueue = EventQueue::new();

/// Push an event into the global queue.
/// Safe to call from any task.  Returns `false` if the event was dropped.
pub fn push_event(event: Event) -> bool {
    let ok = EVENTS.push(event);
    if !ok {
        log::warn!("event queue full, dropped {:?}", event);
    }
    ok
}

pub fn drain_events(handler: impl FnMut(Event)) {
    EVENTS.drain(handler);
}
