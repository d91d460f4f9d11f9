//! Delivery channels for alert messages.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Alert endpoint rejected the alert with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AlertError>;
}

/// Writes alerts to the log. Used when no remote endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl AlertTransport for LogTransport {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        tracing::warn!(subject, "ALERT: {}", body);
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// POSTs each alert as JSON to a webhook (mail relay, push gateway, chat hook...).
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl AlertTransport for WebhookTransport {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { subject, body })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AlertError::Rejected(response.status().as_u16()));
        }
        tracing::debug!("Alert delivered to webhook");
        Ok(())
    }
}
