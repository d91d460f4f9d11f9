//! Hysteresis thermostat host.
//!
//! Samples a 1-Wire temperature sensor, switches a heating relay to keep the
//! room inside a band around the target, logs telemetry on a fixed interval,
//! and sends throttled alerts when something keeps failing.

pub mod alerts;
pub mod config;
pub mod hardware;
pub mod telemetry;
pub mod thermostat;
pub mod web;
