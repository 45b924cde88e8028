//! Polled, debounced push-button with long-press detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up (the BOOT button).  The main
//! loop calls [`ButtonDriver::tick`] every iteration; the driver reads the
//! pin level and runs the debounce + hold state machine.
//!
//! ## Gesture detection
//!
//! | Gesture    | Condition                        | Event       |
//! |-----------|----------------------------------|-------------|
//! | Long press | Held continuously >= `hold_ms`  | `LongPress` |
//!
//! A hold fires once.  The button must be released before another long
//! press can be reported.

use embedded_hal::digital::InputPin;

/// Button events emitted after gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u64 },
    Pressed { since_ms: u64 },
    /// Long press reported; waiting for release.
    Fired,
}

pub struct ButtonDriver<P> {
    pin: P,
    state: GestureState,
    debounce_ms: u64,
    hold_ms: u64,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P, debounce_ms: u32, hold_ms: u32) -> Self {
        Self {
            pin,
            state: GestureState::Idle,
            debounce_ms: u64::from(debounce_ms),
            hold_ms: u64::from(hold_ms),
        }
    }

    /// Call from the main loop.  `now_ms` is monotonic time since boot.
    pub fn tick(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        // A pin read error counts as released.
        let pressed = self.pin.is_low().unwrap_or(false);

        match self.state {
            GestureState::Idle => {
                if pressed {
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                } else if now_ms.saturating_sub(since_ms) >= self.debounce_ms {
                    self.state = GestureState::Pressed { since_ms };
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                    return None;
                }
                if now_ms.saturating_sub(since_ms) >= self.hold_ms {
                    self.state = GestureState::Fired;
                    return Some(ButtonEvent::LongPress);
                }
                None
            }

            GestureState::Fired => {
                if !pressed {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self.state, GestureState::Pressed { .. } | GestureState::Fired)
    }
}
