//! Slack Web API payloads used by `chat.postMessage`.

use serde::{Deserialize, Serialize};

/// Request body for `chat.postMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostMessage {
    pub channel: String,
    /// Fallback for notifications and clients that cannot render blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub blocks: Vec<Block>,
}

impl PostMessage {
    /// A single section with markdown text and an image on the right.
    pub fn image_section(channel: &str, message: &str, image_url: &str, alt_text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            text: Some(message.to_string()),
            blocks: vec![Block::Section {
                text: TextObject::mrkdwn(message),
                accessory: Some(Accessory::Image {
                    image_url: image_url.to_string(),
                    alt_text: alt_text.to_string(),
                }),
            }],
        }
    }
}

/// Layout block. Only the block types this service posts are modelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub text_type: TextType,
    pub text: String,
}

impl TextObject {
    pub fn mrkdwn(text: &str) -> Self {
        Self {
            text_type: TextType::Mrkdwn,
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    Mrkdwn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    Image { image_url: String, alt_text: String },
}

/// Response envelope shared by Slack Web API methods.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PostMessageResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub channel: Option<String>,
    pub ts: Option<String>,
}
