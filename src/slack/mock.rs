use super::{Notifier, PostMessage, PostMessageResponse};
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A message captured by [`MockNotifier`] together with the token it was sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub token: String,
    pub message: PostMessage,
}

#[derive(Clone)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    error_code: Arc<Mutex<Option<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            error_code: Arc::new(Mutex::new(None)),
        }
    }

    /// Reject every post with the given Slack error code.
    pub fn with_error(self, code: &str) -> Self {
        *self.error_code.lock().unwrap() = Some(code.to_string());
        self
    }

    pub fn get_sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn post_message(
        &self,
        token: &str,
        message: &PostMessage,
    ) -> Result<PostMessageResponse> {
        if let Some(code) = self.error_code.lock().unwrap().clone() {
            return Err(crate::Error::Slack(code));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage {
            token: token.to_string(),
            message: message.clone(),
        });

        Ok(PostMessageResponse {
            ok: true,
            error: None,
            channel: Some(message.channel.clone()),
            ts: Some(format!("1700000000.{:06}", sent.len())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_notifier_records_messages() {
        let notifier = MockNotifier::new();
        let message = PostMessage::image_section("C1", "hi", "https://cdn.test/a.png", "a.png");

        let response = notifier.post_message("xoxb", &message).await.unwrap();

        assert_eq!(response.ts.as_deref(), Some("1700000000.000001"));
        let sent = notifier.get_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "xoxb");
        assert_eq!(sent[0].message, message);
    }

    #[tokio::test]
    async fn test_mock_notifier_error() {
        let notifier = MockNotifier::new().with_error("channel_not_found");
        let message = PostMessage::image_section("C1", "hi", "https://cdn.test/a.png", "a.png");

        assert!(notifier.post_message("xoxb", &message).await.is_err());
        assert!(notifier.get_sent().is_empty());
    }
}
