//! Slack notification transport
//!
//! Posts Block Kit messages through the Slack Web API using a bot token.

pub mod client;
pub mod mock;
pub mod types;

pub use client::SlackClient;
pub use mock::MockNotifier;
pub use types::{Accessory, Block, PostMessage, PostMessageResponse, TextObject, TextType};

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `message` with the given bot token; returns Slack's acknowledgement.
    async fn post_message(&self, token: &str, message: &PostMessage)
        -> Result<PostMessageResponse>;
}
