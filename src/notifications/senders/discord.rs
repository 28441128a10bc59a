use async_trait::async_trait;
use reqwest::Client;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{ChannelConfig, OutboundEvent};

pub struct DiscordSender {
    client: Client,
}

impl DiscordSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Discord colors the embed by severity.
fn embed_color(kind: &str) -> u32 {
    match kind {
        "success" => 0x2ecc71,
        "warning" => 0xf1c40f,
        "error" => 0xe74c3c,
        _ => 0x3498db,
    }
}

fn payload(event: &OutboundEvent) -> serde_json::Value {
    serde_json::json!({
        "embeds": [{
            "title": event.title,
            "description": event.message,
            "color": embed_color(&event.kind),
            "timestamp": event.timestamp.to_rfc3339(),
        }]
    })
}

#[async_trait]
impl NotificationSender for DiscordSender {
    async fn send(&self, config: &ChannelConfig, event: &OutboundEvent) -> Result<(), SenderError> {
        let ChannelConfig::Discord { webhook_url } = config else {
            return Err(SenderError::InvalidConfiguration(
                "Expected a Discord config".to_string(),
            ));
        };

        let response = self.client.post(webhook_url).json(&payload(event)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "Discord returned status {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_embeds_title_message_and_severity_color() {
        let event = OutboundEvent::new("error", "Alert: High CPU", "cpu is at 92.0%");
        let body = payload(&event);
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "Alert: High CPU");
        assert_eq!(embed["description"], "cpu is at 92.0%");
        assert_eq!(embed["color"], 0xe74c3c);
    }

    #[test]
    fn unknown_kinds_fall_back_to_info_color() {
        assert_eq!(embed_color("something-else"), 0x3498db);
    }
}
