// src/telemetry/mod.rs - Periodic telemetry logging
pub mod sink;
pub mod weather;

pub use sink::{JsonlSink, LogSink, StorageError};
pub use weather::{NoWeather, TomorrowIoClient, WeatherError, WeatherProvider};

use crate::alerts::AlertThrottle;
use crate::config::TelemetryConfig;
use crate::thermostat::ThermostatController;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

type IndoorFn = Arc<dyn Fn() -> BoxFuture<'static, Result<f64, FetchError>> + Send + Sync>;
type TargetFn = Arc<dyn Fn() -> Result<f64, FetchError> + Send + Sync>;
type HeatingFn = Arc<dyn Fn() -> Result<bool, FetchError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry fields unavailable: {}", .0.join("; "))]
    Incomplete(Vec<String>),
    #[error("Failed to store telemetry: {0}")]
    Storage(#[from] StorageError),
}

/// One logged row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub zone: u32,
    pub indoor_celsius: f64,
    pub outdoor_celsius: Option<f64>,
    pub heating_active: bool,
    pub target_celsius: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Accessors the logger pulls current state through.
#[derive(Clone)]
pub struct TelemetrySources {
    indoor: IndoorFn,
    target: TargetFn,
    heating: HeatingFn,
}

impl TelemetrySources {
    pub fn new<I, Fut, T, H>(indoor: I, target: T, heating: H) -> Self
    where
        I: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<f64, FetchError>> + Send + 'static,
        T: Fn() -> Result<f64, FetchError> + Send + Sync + 'static,
        H: Fn() -> Result<bool, FetchError> + Send + Sync + 'static,
    {
        Self {
            indoor: Arc::new(move || indoor().boxed()),
            target: Arc::new(target),
            heating: Arc::new(heating),
        }
    }

    /// Indoor temperature is a fresh sensor read; heating state is read from the actuator.
    pub fn from_controller(controller: Arc<ThermostatController>) -> Self {
        let indoor = controller.clone();
        let target = controller.clone();
        let heating = controller;
        Self::new(
            move || {
                let controller = indoor.clone();
                async move {
                    let reading = controller.current_temperature().await?;
                    Ok::<f64, FetchError>(reading.celsius())
                }
            },
            move || Ok(target.target()),
            move || Ok(heating.is_active()?),
        )
    }
}

pub struct TelemetryLogger {
    zone: u32,
    interval: Duration,
    sources: TelemetrySources,
    weather: Arc<dyn WeatherProvider>,
    sink: Arc<dyn LogSink>,
    alerts: Arc<AlertThrottle>,
}

impl TelemetryLogger {
    pub fn new(
        config: &TelemetryConfig,
        sources: TelemetrySources,
        weather: Arc<dyn WeatherProvider>,
        sink: Arc<dyn LogSink>,
        alerts: Arc<AlertThrottle>,
    ) -> Self {
        Self {
            zone: config.zone,
            interval: config.interval(),
            sources,
            weather,
            sink,
            alerts,
        }
    }

    /// Gather one record. Outdoor temperature is best-effort; the rest are required.
    pub async fn collect(&self) -> Result<TelemetryRecord, TelemetryError> {
        let indoor = (self.sources.indoor)().await;
        let target = (self.sources.target)();
        let heating = (self.sources.heating)();

        let (indoor, target, heating) = match (indoor, target, heating) {
            (Ok(indoor), Ok(target), Ok(heating)) => (indoor, target, heating),
            (indoor, target, heating) => {
                let mut missing = Vec::new();
                if let Err(e) = indoor {
                    missing.push(format!("indoor temperature: {}", e));
                }
                if let Err(e) = target {
                    missing.push(format!("target temperature: {}", e));
                }
                if let Err(e) = heating {
                    missing.push(format!("heating state: {}", e));
                }
                return Err(TelemetryError::Incomplete(missing));
            }
        };

        let outdoor = match self.weather.outdoor_temperature().await {
            Ok(celsius) => Some(celsius),
            Err(e) => {
                tracing::warn!("Outdoor temperature unavailable: {}", e);
                None
            }
        };

        tracing::debug!(
            indoor,
            ?outdoor,
            heating,
            target,
            "Collected telemetry for zone {}",
            self.zone
        );
        Ok(TelemetryRecord {
            zone: self.zone,
            indoor_celsius: indoor,
            outdoor_celsius: outdoor,
            heating_active: heating,
            target_celsius: target,
            recorded_at: Utc::now(),
        })
    }

    async fn collect_and_store(&self) -> Result<TelemetryRecord, TelemetryError> {
        let record = self.collect().await?;
        self.sink.insert(&record).await?;
        Ok(record)
    }

    /// Run one logging tick. Every failure, including a panic in an accessor,
    /// is turned into an alert; this never fails.
    pub async fn log_once(&self) -> Option<TelemetryRecord> {
        match AssertUnwindSafe(self.collect_and_store()).catch_unwind().await {
            Ok(Ok(record)) => {
                tracing::info!("Logged telemetry for zone {}", self.zone);
                Some(record)
            }
            Ok(Err(e)) => {
                tracing::warn!("Skipping telemetry tick: {}", e);
                self.alerts.report(&e.to_string()).await;
                None
            }
            Err(payload) => {
                let message = format!("Telemetry tick panicked: {}", panic_message(payload.as_ref()));
                tracing::error!("{}", message);
                self.alerts.report(&message).await;
                None
            }
        }
    }

    /// Log every interval until `shutdown_rx` fires.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!("Telemetry logger started for zone {} (every {:?})", self.zone, self.interval);
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = self.log_once() => {}
            }
        }
        tracing::info!("Telemetry logger shutting down");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
