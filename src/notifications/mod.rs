//! Run-summary notifications
//!
//! After a run that moved resources or left some degraded, a [`Notification`]
//! is fanned out to every configured channel.
//!
//! ```text
//!            Notifier
//!               │
//!        ┌──────┴──────┐
//!        ▼             ▼
//!   ┌─────────┐  ┌────────────┐
//!   │ Webhook │  │ Pushbullet │
//!   └─────────┘  └────────────┘
//! ```
//!
//! Delivery never fails a run: each channel reports a [`DeliveryStatus`] and
//! failures are only logged.

pub mod channels;
mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use channels::pushbullet::PushbulletChannel;
pub use channels::webhook::{WebhookChannel, WebhookConfig};
pub use channels::{Channel, ChannelError, ChannelResult, DeliveryStatus};
pub use manager::Notifier;

/// Severity of a run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Resources moved, all of them to working mirrors
    Info,
    /// Some resources have no working mirror or publishing failed
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message ready for delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id
    pub id: String,
    pub severity: Severity,
    /// One-line headline
    pub title: String,
    /// Human-readable detail
    pub body: String,
    /// Structured payload for machine receivers
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        severity: Severity,
        title: impl Into<String>,
        body: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            severity,
            title: title.into(),
            body: body.into(),
            details,
            created_at: Utc::now(),
        }
    }
}
