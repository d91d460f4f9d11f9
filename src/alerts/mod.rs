// src/alerts/mod.rs - Duplicate-suppressing alert reporting
//! Alerts for conditions that need a human.
//!
//! The same message text is delivered at most once per cool-down window. The
//! history map is never pruned: messages are built from a small set of
//! failure conditions, so it stays small over long uptimes.

pub mod transport;

pub use transport::{AlertError, AlertTransport, LogTransport, WebhookTransport};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const ALERT_SUBJECT: &str = "Thermostat error report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Delivered,
    Suppressed,
    TransportFailed,
}

pub struct AlertThrottle {
    transport: Arc<dyn AlertTransport>,
    cooldown: Duration,
    // message text -> when it was last let through
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl AlertThrottle {
    pub fn new(transport: Arc<dyn AlertTransport>, cooldown: Duration) -> Self {
        Self {
            transport,
            cooldown,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Report `message`, unless the identical text went out within the cool-down.
    ///
    /// Transport failures are logged and never returned; the message still
    /// counts as sent for throttling.
    pub async fn report(&self, message: &str) -> AlertOutcome {
        // Held across the send so concurrent identical reports go out once.
        let mut last_sent = self.last_sent.lock().await;
        let now = Instant::now();
        if let Some(sent_at) = last_sent.get(message) {
            if now.duration_since(*sent_at) < self.cooldown {
                tracing::debug!("Suppressing repeated alert: {}", message);
                return AlertOutcome::Suppressed;
            }
        }
        last_sent.insert(message.to_string(), now);

        match self.transport.send(ALERT_SUBJECT, message).await {
            Ok(()) => {
                tracing::info!("Alert sent: {}", message);
                AlertOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!("Failed to deliver alert {:?}: {}", message, e);
                AlertOutcome::TransportFailed
            }
        }
    }

    pub async fn tracked_messages(&self) -> usize {
        self.last_sent.lock().await.len()
    }
}
