//! Cloud status LED.
//!
//! Single GPIO, active HIGH.  Lit while the shadow session is up.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: wraps a `PinDriver` output.
//! On host/test: any `embedded_hal` output pin (mock).

use embedded_hal::digital::OutputPin;

pub struct StatusLed<P> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Takes ownership of the pin and drives it low.
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            log::warn!("status_led: initial set_low failed");
        }
        Self { pin, on: false }
    }

    pub fn set(&mut self, on: bool) {
        let res = if on { self.pin.set_high() } else { self.pin.set_low() };
        if res.is_err() {
            log::warn!("status_led: pin write failed");
            return;
        }
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
