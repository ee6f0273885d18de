//! Fan-out of notifications to registered channels

use futures::future::join_all;

use super::channels::pushbullet::PushbulletChannel;
use super::channels::webhook::WebhookChannel;
use super::channels::{Channel, ChannelResult, DeliveryStatus};
use super::Notification;
use crate::config::NotifyConfig;

/// Delivers notifications through every registered channel
#[derive(Default)]
pub struct Notifier {
    channels: Vec<Box<dyn Channel>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the channels named in configuration
    pub fn from_config(config: &NotifyConfig) -> ChannelResult<Self> {
        let mut notifier = Self::new();

        if let Some(url) = &config.webhook_url {
            notifier.add_channel(Box::new(WebhookChannel::from_url(url.as_str())?));
        }
        if let Some(token) = &config.pushbullet_token {
            notifier.add_channel(Box::new(PushbulletChannel::new(token.as_str())?));
        }

        Ok(notifier)
    }

    /// Add a notification channel
    pub fn add_channel(&mut self, channel: Box<dyn Channel>) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send to all channels concurrently
    pub async fn notify(&self, notification: &Notification) -> Vec<DeliveryStatus> {
        let statuses = join_all(self.channels.iter().map(|c| c.send(notification))).await;

        for status in statuses.iter().filter(|s| !s.success) {
            tracing::warn!(delivery = %status, "Notification not delivered");
        }

        statuses
    }
}
