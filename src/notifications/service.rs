use reqwest::Client;
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::db::entities::notification;
use crate::db::services::{notification_service, settings_service};
use crate::web::error::AppError;

use super::models::{ChannelConfig, ChannelSettings, OutboundEvent};
use super::senders::discord::DiscordSender;
use super::senders::slack::SlackSender;
use super::senders::webhook::WebhookSender;
use super::senders::NotificationSender;

/// Persists every notification and fans it out to the configured outbound
/// channels. A failing channel is logged and never fails the operation that
/// triggered the notification.
pub struct NotificationService {
    db: DatabaseConnection,
    webhook: WebhookSender,
    discord: DiscordSender,
    slack: SlackSender,
}

impl NotificationService {
    pub fn new(db: DatabaseConnection) -> Self {
        let client = Client::new();
        Self {
            db,
            webhook: WebhookSender::new(client.clone()),
            discord: DiscordSender::new(client.clone()),
            slack: SlackSender::new(client),
        }
    }

    /// Records a notification row, then pushes it to every enabled channel.
    pub async fn notify(
        &self,
        kind: &str,
        title: &str,
        message: &str,
    ) -> Result<notification::Model, AppError> {
        let row = notification_service::record(&self.db, kind, title, message).await?;
        self.dispatch(&OutboundEvent::new(kind, title, message))
            .await;
        Ok(row)
    }

    async fn dispatch(&self, event: &OutboundEvent) {
        let settings: ChannelSettings =
            match settings_service::get(&self.db, settings_service::NOTIFICATION_CHANNELS_KEY)
                .await
            {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "Failed to load notification channels, skipping dispatch.");
                    return;
                }
            };

        for channel in settings.channels.iter().filter(|c| c.enabled) {
            let sender: &dyn NotificationSender = match &channel.config {
                ChannelConfig::Webhook { .. } => &self.webhook,
                ChannelConfig::Discord { .. } => &self.discord,
                ChannelConfig::Slack { .. } => &self.slack,
            };
            if let Err(e) = sender.send(&channel.config, event).await {
                warn!(channel = %channel.name, error = %e, "Outbound notification failed.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test_db;
    use crate::notifications::models::ConfiguredChannel;

    #[tokio::test]
    async fn notify_persists_even_with_no_channels_configured() {
        let db = connect_test_db().await;
        let service = NotificationService::new(db.clone());

        let row = service
            .notify("info", "Test notification", "Channels are working")
            .await
            .expect("notify");
        assert_eq!(row.kind, "info");
        assert!(!row.read);

        let listed = notification_service::list(&db, 10).await.expect("list");
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_channel_does_not_fail_notify() {
        let db = connect_test_db().await;
        let settings = ChannelSettings {
            channels: vec![ConfiguredChannel {
                name: "dead-endpoint".to_string(),
                enabled: true,
                config: ChannelConfig::Webhook {
                    // Nothing listens on port 1, so the connection is refused
                    // immediately.
                    url: "http://127.0.0.1:1/hook".to_string(),
                    headers: None,
                },
            }],
        };
        settings_service::set(
            &db,
            settings_service::NOTIFICATION_CHANNELS_KEY,
            &settings,
        )
        .await
        .expect("set channels");

        let service = NotificationService::new(db);
        service
            .notify("warning", "Alert: High CPU", "cpu is at 92.0%")
            .await
            .expect("notify survives channel failure");
    }
}
