// src/hardware/temperature.rs - DS18B20 sampling over 1-Wire
//
// The w1-therm driver exposes each read as two lines:
//
//   54 01 4b 46 7f ff 0c 10 fd : crc=fd YES
//   54 01 4b 46 7f ff 0c 10 fd t=21250
//
// The first line ends in YES once the CRC checks out; the second carries the
// temperature in millidegrees Celsius.

use crate::config::SensorConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("No temperature sensor found: {0}")]
    Unavailable(String),
    #[error("Sensor read timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("Unexpected sensor data format: {0}")]
    Format(String),
    #[error("Sensor IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One temperature sample. Celsius is the only stored unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    celsius: f64,
}

impl TemperatureReading {
    pub fn from_celsius(celsius: f64) -> Self {
        Self { celsius }
    }

    pub fn from_millidegrees(raw: i64) -> Self {
        Self { celsius: raw as f64 / 1000.0 }
    }

    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    pub fn fahrenheit(&self) -> f64 {
        self.celsius * 9.0 / 5.0 + 32.0
    }
}

/// Raw access to a sensor's two-line response.
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn read_raw(&self) -> Result<String, SensorError>;
}

/// A DS18B20 mounted by the w1-therm kernel module.
#[derive(Debug, Clone)]
pub struct W1Sensor {
    device_file: PathBuf,
}

impl W1Sensor {
    /// Find the first device under `base_dir` whose name starts with `prefix`
    /// ("28" is the DS18B20 family code).
    pub fn discover(base_dir: &Path, prefix: &str) -> Result<Self, SensorError> {
        let entries = std::fs::read_dir(base_dir).map_err(|e| {
            SensorError::Unavailable(format!("cannot list {}: {}", base_dir.display(), e))
        })?;

        let mut devices: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
            .map(|entry| entry.path())
            .collect();
        devices.sort();

        let device = devices.into_iter().next().ok_or_else(|| {
            SensorError::Unavailable(format!(
                "no '{}*' device under {}; is it wired correctly?",
                prefix,
                base_dir.display()
            ))
        })?;

        tracing::info!("Using temperature sensor {}", device.display());
        Ok(Self { device_file: device.join("w1_slave") })
    }

    pub fn device_file(&self) -> &Path {
        &self.device_file
    }
}

#[async_trait]
impl SensorSource for W1Sensor {
    async fn read_raw(&self) -> Result<String, SensorError> {
        Ok(tokio::fs::read_to_string(&self.device_file).await?)
    }
}

/// Parse a two-line w1-therm response.
///
/// Returns `Ok(None)` when the CRC marker is not `YES`, meaning the caller
/// should retry.
pub fn parse_w1_response(raw: &str) -> Result<Option<TemperatureReading>, SensorError> {
    let mut lines = raw.lines();
    let status = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| SensorError::Format("empty response".to_string()))?;
    if !status.trim_end().ends_with("YES") {
        return Ok(None);
    }

    let data = lines
        .next()
        .ok_or_else(|| SensorError::Format("missing data line".to_string()))?;
    let (_, value) = data
        .split_once("t=")
        .ok_or_else(|| SensorError::Format(format!("no t= field in {:?}", data.trim())))?;
    let raw_value: i64 = value
        .trim()
        .parse()
        .map_err(|_| SensorError::Format(format!("invalid reading {:?}", value.trim())))?;

    Ok(Some(TemperatureReading::from_millidegrees(raw_value)))
}

/// Takes one fresh measurement per `read()`, retrying while the sensor
/// reports an invalid CRC.
pub struct SensorReader {
    source: Arc<dyn SensorSource>,
    max_attempts: u32,
    retry_interval: Duration,
}

impl SensorReader {
    pub fn new(source: Arc<dyn SensorSource>, config: &SensorConfig) -> Self {
        Self {
            source,
            max_attempts: config.max_attempts.max(1),
            retry_interval: config.retry_interval(),
        }
    }

    pub async fn read(&self) -> Result<TemperatureReading, SensorError> {
        let mut attempts = 0;
        loop {
            let raw = self.source.read_raw().await?;
            attempts += 1;

            if let Some(reading) = parse_w1_response(&raw)? {
                tracing::debug!("Sensor read {:.3}°C after {} attempt(s)", reading.celsius(), attempts);
                return Ok(reading);
            }
            if attempts >= self.max_attempts {
                return Err(SensorError::Timeout { attempts });
            }

            tracing::trace!("Sensor not ready (attempt {}), retrying", attempts);
            tokio::time::sleep(self.retry_interval).await;
        }
    }
}
