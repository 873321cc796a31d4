use super::SecretStore;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;

pub struct SecretsManagerStore {
    client: SecretsManagerClient,
}

impl SecretsManagerStore {
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(SecretsManagerClient::new(&config))
    }

    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to read secret {}: {}", secret_id, e);
                Error::Secrets(format!("Failed to read secret {}: {}", secret_id, e))
            })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| Error::Secrets(format!("Secret {} has no string value", secret_id)))
    }
}
