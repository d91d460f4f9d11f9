//! # Thermostat Configuration
//!
//! Every section and field carries a default, so an empty file yields a
//! configuration for a single DS18B20 sensor and an active-low relay on
//! GPIO 26.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [control]
//! initial_target = 21.0
//! hysteresis = 0.5
//!
//! [relay]
//! pin = 26
//!
//! [telemetry]
//! zone = 3
//! log_path = "/var/lib/thermostat/telemetry.jsonl"
//!
//! [alerts]
//! webhook_url = "https://hooks.example.com/thermostat"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for the sensor, relay, control loop, telemetry and API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// 1-Wire sensor discovery and read protocol.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    #[serde(default = "default_w1_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl SensorConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            base_dir: default_w1_base_dir(),
            device_prefix: default_device_prefix(),
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

/// Hysteresis control loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default = "default_initial_target")]
    pub initial_target: f64,
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,
    #[serde(default = "default_control_interval_secs")]
    pub interval_secs: u64,
}

impl ControlConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            initial_target: default_initial_target(),
            hysteresis: default_hysteresis(),
            interval_secs: default_control_interval_secs(),
        }
    }
}

/// Heating relay on a sysfs GPIO line.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_pin")]
    pub pin: u32,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
    #[serde(default = "default_active_low")]
    pub active_low: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pin: default_relay_pin(),
            gpio_root: default_gpio_root(),
            active_low: default_active_low(),
        }
    }
}

/// Periodic telemetry logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_zone")]
    pub zone: u32,
    #[serde(default = "default_telemetry_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            zone: default_zone(),
            interval_secs: default_telemetry_interval_secs(),
            log_path: default_log_path(),
        }
    }
}

/// Outdoor weather lookup. Both `location` and an API key are needed to enable it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
}

impl WeatherConfig {
    /// The configured key, falling back to `WEATHER_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("WEATHER_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            location: None,
            api_key: None,
            timeout_secs: default_weather_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u64,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        // Saturates rather than overflowing; a huge value just means "never repeat".
        Duration::from_secs(self.cooldown_hours.saturating_mul(60 * 60))
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_hours: default_cooldown_hours(),
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Config {
    /// Reject values the control and telemetry loops cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.control.initial_target.is_finite() {
            return Err(ConfigError::Invalid("control.initial_target must be finite".to_string()));
        }
        if !self.control.hysteresis.is_finite() || self.control.hysteresis <= 0.0 {
            return Err(ConfigError::Invalid("control.hysteresis must be > 0".to_string()));
        }
        if self.control.interval_secs == 0 {
            return Err(ConfigError::Invalid("control.interval_secs must be > 0".to_string()));
        }
        if self.telemetry.interval_secs == 0 {
            return Err(ConfigError::Invalid("telemetry.interval_secs must be > 0".to_string()));
        }
        if self.sensor.max_attempts == 0 {
            return Err(ConfigError::Invalid("sensor.max_attempts must be > 0".to_string()));
        }
        Ok(())
    }
}

// Default value functions
fn default_w1_base_dir() -> PathBuf { PathBuf::from("/sys/bus/w1/devices") }
fn default_device_prefix() -> String { "28".to_string() }
fn default_max_attempts() -> u32 { 10 }
fn default_retry_interval_ms() -> u64 { 200 }
fn default_initial_target() -> f64 { 20.0 }
fn default_hysteresis() -> f64 { 0.5 }
fn default_control_interval_secs() -> u64 { 5 }
fn default_relay_pin() -> u32 { 26 }
fn default_gpio_root() -> PathBuf { PathBuf::from("/sys/class/gpio") }
fn default_active_low() -> bool { true }
fn default_zone() -> u32 { 3 }
fn default_telemetry_interval_secs() -> u64 { 600 }
fn default_log_path() -> PathBuf { PathBuf::from("telemetry.jsonl") }
fn default_weather_timeout_secs() -> u64 { 10 }
fn default_cooldown_hours() -> u64 { 24 }
fn default_bind() -> String { "0.0.0.0:3000".to_string() }

/// Load and validate configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}
