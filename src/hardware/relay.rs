//! Heating relay driven through the Linux sysfs GPIO interface.

use crate::config::RelayConfig;
use crate::hardware::{Actuator, ActuatorError};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// A relay on a single GPIO line. Most relay boards are active-low, so by
/// default a low line energises the coil.
#[derive(Debug)]
pub struct GpioRelay {
    pin: u32,
    gpio_root: PathBuf,
    pin_dir: PathBuf,
    active_low: bool,
    released: AtomicBool,
}

impl GpioRelay {
    /// Export the pin if needed and configure it as an output in the inactive state.
    pub fn new(config: &RelayConfig) -> Result<Self, ActuatorError> {
        let pin_dir = config.gpio_root.join(format!("gpio{}", config.pin));
        if !pin_dir.exists() {
            tracing::debug!("Exporting GPIO {}", config.pin);
            fs::write(config.gpio_root.join("export"), config.pin.to_string())?;
        }

        // "high"/"low" set the direction and the initial level in one write,
        // so the relay never glitches on while being configured.
        let initial = if config.active_low { "high" } else { "low" };
        fs::write(pin_dir.join("direction"), initial)?;

        tracing::info!(
            "Relay ready on GPIO {} ({})",
            config.pin,
            if config.active_low { "active low" } else { "active high" }
        );
        Ok(Self {
            pin: config.pin,
            gpio_root: config.gpio_root.clone(),
            pin_dir,
            active_low: config.active_low,
            released: AtomicBool::new(false),
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    fn level(&self, active: bool) -> &'static str {
        if active != self.active_low { "1" } else { "0" }
    }

    fn write_level(&self, active: bool) -> Result<(), ActuatorError> {
        fs::write(self.pin_dir.join("value"), self.level(active))?;
        Ok(())
    }
}

impl Actuator for GpioRelay {
    fn is_active(&self) -> Result<bool, ActuatorError> {
        let raw = fs::read_to_string(self.pin_dir.join("value"))?;
        let high = match raw.trim() {
            "1" => true,
            "0" => false,
            other => return Err(ActuatorError::InvalidState(other.to_string())),
        };
        Ok(high != self.active_low)
    }

    fn turn_on(&self) -> Result<(), ActuatorError> {
        self.write_level(true)?;
        tracing::info!("Relay ON");
        Ok(())
    }

    fn turn_off(&self) -> Result<(), ActuatorError> {
        self.write_level(false)?;
        tracing::info!("Relay OFF");
        Ok(())
    }

    fn cleanup(&self) -> Result<(), ActuatorError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.write_level(false)?;
        if self.pin_dir.exists() {
            fs::write(self.gpio_root.join("unexport"), self.pin.to_string())?;
        }
        tracing::info!("GPIO {} released", self.pin);
        Ok(())
    }
}
