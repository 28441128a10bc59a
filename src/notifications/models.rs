use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration of one outbound channel type, stored (as part of
/// `ChannelSettings`) in the settings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    Webhook {
        url: String,
        headers: Option<HashMap<String, String>>,
    },
    Discord {
        webhook_url: String,
    },
    Slack {
        webhook_url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredChannel {
    pub name: String,
    pub enabled: bool,
    pub config: ChannelConfig,
}

/// The full outbound channel configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSettings {
    #[serde(default)]
    pub channels: Vec<ConfiguredChannel>,
}

/// One event pushed to the outbound channels.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl OutboundEvent {
    pub fn new(kind: &str, title: &str, message: &str) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }
}
