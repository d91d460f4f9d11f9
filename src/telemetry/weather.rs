//! Outdoor temperature lookup. Only used as an extra telemetry field.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const TOMORROW_IO_URL: &str = "https://api.tomorrow.io/v4/timelines";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Weather response missing {0}")]
    MissingField(&'static str),
    #[error("Weather lookup not configured")]
    NotConfigured,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn outdoor_temperature(&self) -> Result<f64, WeatherError>;
}

/// Stand-in when no weather service is configured; every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWeather;

#[async_trait]
impl WeatherProvider for NoWeather {
    async fn outdoor_temperature(&self) -> Result<f64, WeatherError> {
        Err(WeatherError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
pub struct TimelinesResponse {
    data: TimelinesData,
}

#[derive(Debug, Deserialize)]
struct TimelinesData {
    #[serde(default)]
    timelines: Vec<Timeline>,
}

#[derive(Debug, Deserialize)]
struct Timeline {
    #[serde(default)]
    intervals: Vec<Interval>,
}

#[derive(Debug, Deserialize)]
struct Interval {
    values: IntervalValues,
}

#[derive(Debug, Deserialize)]
struct IntervalValues {
    temperature: Option<f64>,
}

impl TimelinesResponse {
    /// Current temperature from the first interval of the first timeline.
    pub fn current_temperature(&self) -> Result<f64, WeatherError> {
        let timeline = self.data.timelines.first().ok_or(WeatherError::MissingField("timelines"))?;
        let interval = timeline.intervals.first().ok_or(WeatherError::MissingField("intervals"))?;
        interval.values.temperature.ok_or(WeatherError::MissingField("temperature"))
    }
}

/// Client for the tomorrow.io timelines API (metric units, current timestep).
#[derive(Debug, Clone)]
pub struct TomorrowIoClient {
    client: reqwest::Client,
    base_url: String,
    location: String,
    api_key: String,
}

impl TomorrowIoClient {
    pub fn new(location: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: TOMORROW_IO_URL.to_string(),
            location: location.into(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl WeatherProvider for TomorrowIoClient {
    async fn outdoor_temperature(&self) -> Result<f64, WeatherError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("location", self.location.as_str()),
                ("fields", "temperature"),
                ("timesteps", "current"),
                ("units", "metric"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: TimelinesResponse = response.json().await?;
        body.current_temperature()
    }
}
