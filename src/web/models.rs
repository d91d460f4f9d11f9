//! Contains the data models for API requests and responses.

use crate::thermostat::HeatingMode;
use serde::{Deserialize, Serialize};

/// Represents the current state of the thermostat.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Last reading taken by the control loop; `None` until the first tick.
    pub current_temperature: Option<f64>,
    pub target_temperature: f64,
    pub heating_active: bool,
    pub mode: HeatingMode,
}

/// Represents a request to change the target temperature.
#[derive(Debug, Serialize, Deserialize)]
pub struct TargetRequest {
    pub celsius: f64,
}

/// Represents a request to change the heating mode.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModeRequest {
    pub mode: HeatingMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
