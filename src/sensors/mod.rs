//! Sensor subsystem.
//!
//! A single analog input today; [`adc::AdcSensor`] is wrapped by the
//! hardware adapter to implement [`AdcPort`](crate::app::ports::AdcPort).

pub mod adc;
