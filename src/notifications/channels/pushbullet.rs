//! Pushbullet note channel

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::{check_response, Channel, ChannelError, ChannelResult, DeliveryStatus};
use crate::notifications::Notification;
use crate::utils::retry::{with_retry_if, RetryConfig, Sleeper, TokioSleeper};

/// Pushbullet push endpoint
pub const PUSHBULLET_API: &str = "https://api.pushbullet.com/v2/pushes";

/// Sends the summary as a Pushbullet note
pub struct PushbulletChannel {
    token: String,
    endpoint: String,
    client: Client,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl PushbulletChannel {
    pub fn new(token: impl Into<String>) -> ChannelResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ChannelError::InvalidConfig(
                "Pushbullet token cannot be empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            token,
            endpoint: PUSHBULLET_API.to_string(),
            client,
            retry: RetryConfig::exponential(2, 1000, 8000),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Point at a different API endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn build_payload(notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "type": "note",
            "title": notification.title,
            "body": notification.body,
        })
    }

    async fn push(&self, payload: &serde_json::Value) -> ChannelResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Access-Token", &self.token)
            .json(payload)
            .send()
            .await?;
        check_response(response).await
    }
}

#[async_trait]
impl Channel for PushbulletChannel {
    fn name(&self) -> &str {
        "pushbullet"
    }

    async fn send(&self, notification: &Notification) -> DeliveryStatus {
        let payload = Self::build_payload(notification);

        match with_retry_if(
            &self.retry,
            self.sleeper.as_ref(),
            || self.push(&payload),
            ChannelError::is_retryable,
        )
        .await
        {
            Ok(()) => {
                tracing::info!("Pushbullet note sent");
                DeliveryStatus::success(self.name(), "Note sent")
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send Pushbullet note");
                DeliveryStatus::failure(self.name(), e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for PushbulletChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushbulletChannel")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
