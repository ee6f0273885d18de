//! Webhook notification channel
//!
//! Sends the run summary as a JSON POST.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{check_response, Channel, ChannelError, ChannelResult, DeliveryStatus};
use crate::notifications::Notification;
use crate::utils::retry::{with_retry_if, RetryConfig, Sleeper, TokioSleeper};

/// Webhook channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Custom headers to include in requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retry attempts on failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    2
}

impl WebhookConfig {
    /// Create a new webhook configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            headers: HashMap::new(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Webhook notification channel
///
/// # Payload Format
///
/// ```json
/// {
///   "id": "4f1c...",
///   "severity": "warning",
///   "title": "mirrorwatch: 1 failed over, 1 degraded",
///   "body": "...",
///   "summary": { "run_id": "...", "failed_over": 1, ... },
///   "created_at": "2024-01-01T12:00:00Z"
/// }
/// ```
pub struct WebhookChannel {
    config: WebhookConfig,
    client: Client,
    sleeper: Arc<dyn Sleeper>,
}

impl WebhookChannel {
    /// Create a new webhook channel
    pub fn new(config: WebhookConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Create a simple webhook channel with just a URL
    pub fn from_url(url: impl Into<String>) -> ChannelResult<Self> {
        Self::new(WebhookConfig::new(url))
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Build the webhook payload from a notification
    fn build_payload(&self, notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "id": notification.id,
            "severity": notification.severity.as_str(),
            "title": notification.title,
            "body": notification.body,
            "summary": notification.details,
            "created_at": notification.created_at.to_rfc3339(),
        })
    }

    async fn post(&self, payload: &serde_json::Value) -> ChannelResult<()> {
        let mut request = self.client.post(&self.config.url);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request.json(payload).send().await?;
        check_response(response).await
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> DeliveryStatus {
        let payload = self.build_payload(notification);
        let retry = RetryConfig::exponential(self.config.max_retries, 1000, 8000);

        match with_retry_if(
            &retry,
            self.sleeper.as_ref(),
            || self.post(&payload),
            ChannelError::is_retryable,
        )
        .await
        {
            Ok(()) => {
                tracing::info!(url = %self.config.url, "Webhook delivered");
                DeliveryStatus::success(self.name(), format!("Delivered to {}", self.config.url))
            }
            Err(e) => {
                tracing::error!(url = %self.config.url, error = %e, "Failed to deliver webhook");
                DeliveryStatus::failure(self.name(), e.to_string())
            }
        }
    }
}
