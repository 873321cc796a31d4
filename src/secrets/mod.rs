//! Secret store access for the notification function.

pub mod client;
pub mod mock;

pub use client::SecretsManagerStore;
pub use mock::MockSecretStore;

use crate::models::SlackCredentials;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// The secret's string value. Binary-only secrets are an error.
    async fn secret_string(&self, secret_id: &str) -> Result<String>;
}

/// Fetch and parse the Slack credentials held in `secret_id`.
pub async fn load_slack_credentials(
    store: &dyn SecretStore,
    secret_id: &str,
) -> Result<SlackCredentials> {
    let raw = store.secret_string(secret_id).await?;
    SlackCredentials::parse(&raw)
}
