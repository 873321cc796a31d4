//! Notification function: announce the uploaded plot in Slack.

use crate::models::{
    validate_file_name, NotificationConfig, NotificationEvent, NotificationReceipt,
};
use crate::secrets::{load_slack_credentials, SecretStore};
use crate::slack::{Notifier, PostMessage};
use crate::{Error, Result};
use tracing::info;

/// Injectable service bundle used to construct [`NotificationHandler`].
pub struct NotificationServices {
    pub secrets: Box<dyn SecretStore>,
    pub notifier: Box<dyn Notifier>,
}

pub struct NotificationHandler {
    secrets: Box<dyn SecretStore>,
    notifier: Box<dyn Notifier>,
    secret_id: String,
    distribution_url: String,
    message: String,
}

impl NotificationHandler {
    pub fn with_services(services: NotificationServices, config: &NotificationConfig) -> Self {
        Self {
            secrets: services.secrets,
            notifier: services.notifier,
            secret_id: config.secret_id.clone(),
            distribution_url: config.distribution_url.clone(),
            message: config.message.clone(),
        }
    }

    /// Public CDN URL of an object stored at the bucket root.
    pub fn image_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.distribution_url.trim_end_matches('/'), file_name)
    }

    /// Handle a raw event as delivered by the workflow.
    pub async fn handle_value(&self, event: serde_json::Value) -> Result<NotificationReceipt> {
        let event: NotificationEvent = serde_json::from_value(event).map_err(|e| {
            Error::InvalidEvent(format!("Expected a LambdaInvoke result with Payload.file_name: {}", e))
        })?;
        self.handle(event).await
    }

    pub async fn handle(&self, event: NotificationEvent) -> Result<NotificationReceipt> {
        let file_name = event.payload.file_name;
        validate_file_name(&file_name)?;

        let credentials = load_slack_credentials(self.secrets.as_ref(), &self.secret_id).await?;
        let image_url = self.image_url(&file_name);

        let message =
            PostMessage::image_section(&credentials.channel, &self.message, &image_url, &file_name);
        let response = self
            .notifier
            .post_message(&credentials.bot_token, &message)
            .await?;

        info!(
            "Notified channel {} about {}",
            credentials.channel, image_url
        );

        Ok(NotificationReceipt {
            channel: response.channel.unwrap_or(credentials.channel),
            ts: response.ts,
            image_url,
        })
    }
}
