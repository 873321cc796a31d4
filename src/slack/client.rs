use super::{Notifier, PostMessage, PostMessageResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://slack.com";

pub struct SlackClient {
    client: Client,
    base_url: String,
}

impl SlackClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(client))
    }

    pub fn new_with_client(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn post_message(
        &self,
        token: &str,
        message: &PostMessage,
    ) -> Result<PostMessageResponse> {
        let url = format!("{}/api/chat.postMessage", self.base_url);
        tracing::debug!("Posting Slack message to channel {}", message.channel);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to Slack: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Slack API error (status {}): {}", status, error_text);
            return Err(Error::Slack(format!(
                "HTTP status {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        let result: PostMessageResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Slack response: {}\nBody: {}", e, body);
            Error::Slack(format!("Failed to parse Slack response: {}", e))
        })?;

        if !result.ok {
            let code = result.error.unwrap_or_else(|| "unknown_error".to_string());
            tracing::error!("Slack rejected chat.postMessage: {}", code);
            return Err(Error::Slack(code));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_message() -> PostMessage {
        PostMessage::image_section(
            "C0123",
            "uploaded",
            "https://cdn.test/sample.png",
            "sample.png",
        )
    }

    fn client_for(server: &MockServer) -> SlackClient {
        SlackClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_post_message_sends_bearer_and_blocks() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(header("Authorization", "Bearer xoxb-test"))
            .and(body_partial_json(serde_json::json!({
                "channel": "C0123",
                "blocks": [{ "accessory": { "image_url": "https://cdn.test/sample.png" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "channel": "C0123",
                "ts": "1700000000.000100"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .post_message("xoxb-test", &sample_message())
            .await
            .unwrap();

        assert!(response.ok);
        assert_eq!(response.ts.as_deref(), Some("1700000000.000100"));
    }

    #[tokio::test]
    async fn test_api_level_error_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "error": "invalid_auth"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post_message("xoxb-bad", &sample_message())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Slack(ref code) if code == "invalid_auth"));
    }

    #[tokio::test]
    async fn test_http_error_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_string("ratelimited"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post_message("xoxb-test", &sample_message())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Slack(_)));
        assert!(err.to_string().contains("429"));
    }
}
