//! Application core: pure domain logic, zero I/O.
//!
//! Sampling cadence, change-only publishing, link/cloud session handling
//! and factory reset.  All interaction with hardware and the network
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
