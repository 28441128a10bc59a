use async_trait::async_trait;
use thiserror::Error;

use super::models::{ChannelConfig, OutboundEvent};

pub mod discord;
pub mod slack;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// One outbound channel type. Implementations receive the channel's
/// configuration and the event to push.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, config: &ChannelConfig, event: &OutboundEvent) -> Result<(), SenderError>;
}
