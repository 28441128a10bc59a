use async_trait::async_trait;
use reqwest::Client;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{ChannelConfig, OutboundEvent};

pub struct SlackSender {
    client: Client,
}

impl SlackSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn payload(event: &OutboundEvent) -> serde_json::Value {
    serde_json::json!({
        "text": format!("*{}*\n{}", event.title, event.message),
    })
}

#[async_trait]
impl NotificationSender for SlackSender {
    async fn send(&self, config: &ChannelConfig, event: &OutboundEvent) -> Result<(), SenderError> {
        let ChannelConfig::Slack { webhook_url } = config else {
            return Err(SenderError::InvalidConfiguration(
                "Expected a Slack config".to_string(),
            ));
        };

        let response = self.client.post(webhook_url).json(&payload(event)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "Slack returned status {status}"
            )));
        }
        Ok(())
    }
}
