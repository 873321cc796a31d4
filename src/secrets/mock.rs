use super::SecretStore;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockSecretStore {
    secrets: Arc<Mutex<HashMap<String, String>>>,
    read_count: Arc<Mutex<usize>>,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self {
            secrets: Arc::new(Mutex::new(HashMap::new())),
            read_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_secret(self, secret_id: &str, value: &str) -> Self {
        self.secrets
            .lock()
            .unwrap()
            .insert(secret_id.to_string(), value.to_string());
        self
    }

    /// Convenience for a secret holding Slack credentials.
    pub fn with_slack_credentials(self, secret_id: &str, token: &str, channel: &str) -> Self {
        let value = serde_json::json!({
            "SLACK_BOT_TOKEN": token,
            "SLACK_CHANNEL_TO_NOTIFY": channel,
        })
        .to_string();
        self.with_secret(secret_id, &value)
    }

    pub fn get_read_count(&self) -> usize {
        *self.read_count.lock().unwrap()
    }
}

impl Default for MockSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        *self.read_count.lock().unwrap() += 1;

        self.secrets
            .lock()
            .unwrap()
            .get(secret_id)
            .cloned()
            .ok_or_else(|| crate::Error::Secrets(format!("Secret not found: {}", secret_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::load_slack_credentials;

    #[tokio::test]
    async fn test_load_slack_credentials() {
        let store = MockSecretStore::new().with_slack_credentials("slack", "xoxb-test", "C42");

        let creds = load_slack_credentials(&store, "slack").await.unwrap();
        assert_eq!(creds.bot_token, "xoxb-test");
        assert_eq!(creds.channel, "C42");
        assert_eq!(store.get_read_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let store = MockSecretStore::new();
        let err = load_slack_credentials(&store, "slack").await.unwrap_err();
        assert!(err.to_string().contains("Secret not found"));
    }

    #[tokio::test]
    async fn test_placeholder_secret_is_rejected() {
        let store = MockSecretStore::new().with_slack_credentials("slack", "dummy", "dummy");
        assert!(load_slack_credentials(&store, "slack").await.is_err());
    }
}
