// src/hardware/mod.rs - Sensor and actuator boundary
pub mod relay;
pub mod temperature;

pub use relay::GpioRelay;
pub use temperature::{SensorError, SensorReader, SensorSource, TemperatureReading, W1Sensor};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("GPIO IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected GPIO value: {0:?}")]
    InvalidState(String),
}

/// Binary heating actuator.
///
/// Implementations must be callable from both the control loop and the
/// telemetry loop, so every method takes `&self`. `is_active` reports the live
/// hardware state; callers must not cache it. `cleanup` must tolerate being
/// called more than once.
pub trait Actuator: Send + Sync {
    fn is_active(&self) -> Result<bool, ActuatorError>;
    fn turn_on(&self) -> Result<(), ActuatorError>;
    fn turn_off(&self) -> Result<(), ActuatorError>;
    fn cleanup(&self) -> Result<(), ActuatorError>;
}
