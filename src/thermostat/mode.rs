//! Heating mode commands relayed from the presentation layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown heating mode value: {0}")]
pub struct UnknownModeError(pub u8);

/// Target heating/cooling state as exposed to remote clients.
///
/// Only heating hardware exists, so COOL behaves like OFF and AUTO like HEAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum HeatingMode {
    #[default]
    Off = 0,
    Heat = 1,
    Cool = 2,
    Auto = 3,
}

impl HeatingMode {
    /// Whether this mode runs the control loop.
    pub fn runs_control_loop(self) -> bool {
        matches!(self, HeatingMode::Heat | HeatingMode::Auto)
    }
}

impl TryFrom<u8> for HeatingMode {
    type Error = UnknownModeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HeatingMode::Off),
            1 => Ok(HeatingMode::Heat),
            2 => Ok(HeatingMode::Cool),
            3 => Ok(HeatingMode::Auto),
            other => Err(UnknownModeError(other)),
        }
    }
}

impl fmt::Display for HeatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeatingMode::Off => "off",
            HeatingMode::Heat => "heat",
            HeatingMode::Cool => "cool",
            HeatingMode::Auto => "auto",
        };
        f.write_str(name)
    }
}
