use async_trait::async_trait;
use reqwest::{header, Client};

use super::{NotificationSender, SenderError};
use crate::notifications::models::{ChannelConfig, OutboundEvent};

/// Pushes the raw event as JSON to a user-configured endpoint.
pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, config: &ChannelConfig, event: &OutboundEvent) -> Result<(), SenderError> {
        let ChannelConfig::Webhook { url, headers } = config else {
            return Err(SenderError::InvalidConfiguration(
                "Expected a webhook config".to_string(),
            ));
        };

        let mut request = self.client.post(url).json(event);
        if let Some(extra) = headers {
            let mut header_map = header::HeaderMap::new();
            for (key, value) in extra {
                let name = header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("Invalid header name: {e}"))
                })?;
                let value = header::HeaderValue::from_str(value).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("Invalid header value: {e}"))
                })?;
                header_map.insert(name, value);
            }
            request = request.headers(header_map);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "Webhook returned status {status}"
            )));
        }
        Ok(())
    }
}
