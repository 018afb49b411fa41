//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookNotifier`] POSTs each [`UpdateNotification`] as JSON to a fixed
//! URL. Failed attempts are retried with exponential backoff (1 s, 2 s, 4 s)
//! before the error is returned. Progress updates are only logged.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::notifier::{Notifier, NotifyError, UpdateNotification};

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Event name sent in every payload.
const EVENT_TYPE: &str = "tracker.new_chapters";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// Delivers update notifications to an external webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry_delays: RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        })
    }

    /// Replace the backoff schedule. One extra attempt follows the last delay.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Deliver a notification with retry.
    ///
    /// Returns `Ok(())` on the first successful attempt, otherwise the first
    /// error seen.
    pub async fn deliver(&self, notification: &UpdateNotification) -> Result<(), WebhookError> {
        let payload = serde_json::json!({
            "event_type": EVENT_TYPE,
            "notification": notification,
            "timestamp": Utc::now(),
        });

        let mut first_err: Option<WebhookError> = None;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %self.url,
                        manga_id = notification.manga_id,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    first_err.get_or_insert(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(&payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(
                    url = %self.url,
                    manga_id = notification.manga_id,
                    error = %e,
                    "Webhook delivery failed after all retries"
                );
                Err(first_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn show_progress(&self, max: usize, progress: usize) {
        tracing::debug!(progress, max, "Checking for new chapters");
    }

    fn cancel_progress(&self) {
        tracing::debug!("Update check finished");
    }

    async fn notify_updates(&self, notification: &UpdateNotification) -> Result<(), NotifyError> {
        self.deliver(notification).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
