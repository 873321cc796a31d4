//! Data models and structures
//!
//! Payloads exchanged between the workflow and the two compute units, the
//! Slack credentials stored in Secrets Manager, and per-function configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PLOT_FILE_NAME: &str = "sample.png";
pub const DEFAULT_NOTIFICATION_MESSAGE: &str = "ファイルがアップロードされました";

/// Value written into the secret at deploy time; operators replace it by hand.
pub const SECRET_PLACEHOLDER: &str = "dummy";

/// Output of the plot function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlotOutput {
    pub file_name: String,
}

/// Envelope a `LambdaInvoke` task wraps around a function's return value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeResult<T> {
    #[serde(rename = "Payload")]
    pub payload: T,
    #[serde(rename = "StatusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(
        rename = "ExecutedVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub executed_version: Option<String>,
}

impl<T> InvokeResult<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            status_code: Some(200),
            executed_version: Some("$LATEST".to_string()),
        }
    }
}

/// Event received by the notification function.
pub type NotificationEvent = InvokeResult<PlotOutput>;

/// Output of the notification function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationReceipt {
    pub channel: String,
    pub ts: Option<String>,
    pub image_url: String,
}

/// Slack credentials as stored in the secret string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlackCredentials {
    #[serde(rename = "SLACK_BOT_TOKEN")]
    pub bot_token: String,
    #[serde(rename = "SLACK_CHANNEL_TO_NOTIFY")]
    pub channel: String,
}

impl SlackCredentials {
    pub fn parse(secret_string: &str) -> Result<Self> {
        let credentials: SlackCredentials = serde_json::from_str(secret_string)
            .map_err(|e| Error::Secrets(format!("Malformed Slack credentials: {}", e)))?;

        for (name, value) in [
            ("SLACK_BOT_TOKEN", &credentials.bot_token),
            ("SLACK_CHANNEL_TO_NOTIFY", &credentials.channel),
        ] {
            let value = value.trim();
            if value.is_empty() {
                return Err(Error::Secrets(format!("{} is empty", name)));
            }
            if value == SECRET_PLACEHOLDER {
                return Err(Error::Secrets(format!(
                    "{} still holds the deployment placeholder; set the real value in Secrets Manager",
                    name
                )));
            }
        }

        Ok(credentials)
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub bucket_name: String,
    pub file_name: String,
    pub output_dir: PathBuf,
}

impl PlotConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_name = lookup("PLOT_FILE_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLOT_FILE_NAME.to_string());
        validate_file_name(&file_name).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            bucket_name: required(&lookup, "S3_BUCKET_NAME")?,
            file_name,
            output_dir: lookup("PLOT_OUTPUT_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub secret_id: String,
    pub distribution_url: String,
    pub message: String,
    pub slack_api_base_url: Option<String>,
}

impl NotificationConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let distribution_url = required(&lookup, "CLOUD_FRONT_DISTRIBUTION_URL")?;
        if !distribution_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "CLOUD_FRONT_DISTRIBUTION_URL must be an https URL, got '{}'",
                distribution_url
            )));
        }

        Ok(Self {
            secret_id: required(&lookup, "SLACK_CREDENTIALS_SECRET_ID")?,
            distribution_url,
            message: lookup("NOTIFICATION_MESSAGE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_MESSAGE.to_string()),
            slack_api_base_url: lookup("SLACK_API_BASE_URL").filter(|v| !v.trim().is_empty()),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{} not set", key)))
}

/// Object keys double as URL path segments behind the CDN, so only characters
/// that need no percent-encoding are accepted.
pub fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.trim().is_empty() {
        return Err(Error::InvalidEvent("file_name is empty".to_string()));
    }
    if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
        return Err(Error::InvalidEvent(format!(
            "file_name '{}' must be a bare file name",
            file_name
        )));
    }
    if let Some(c) = file_name
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::InvalidEvent(format!(
            "file_name '{}' contains {:?}; use letters, digits, '-', '_' or '.'",
            file_name, c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_notification_event_deserialization() {
        let event: NotificationEvent = serde_json::from_value(serde_json::json!({
            "ExecutedVersion": "$LATEST",
            "Payload": { "file_name": "sample.png" },
            "SdkHttpMetadata": { "HttpStatusCode": 200 },
            "StatusCode": 200
        }))
        .unwrap();

        assert_eq!(event.payload.file_name, "sample.png");
        assert_eq!(event.status_code, Some(200));
    }

    #[test]
    fn test_notification_event_requires_payload() {
        let result: std::result::Result<NotificationEvent, _> =
            serde_json::from_value(serde_json::json!({ "file_name": "sample.png" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_slack_credentials_parse() {
        let creds = SlackCredentials::parse(
            r#"{"SLACK_BOT_TOKEN":"xoxb-1","SLACK_CHANNEL_TO_NOTIFY":"C0123"}"#,
        )
        .unwrap();
        assert_eq!(creds.bot_token, "xoxb-1");
        assert_eq!(creds.channel, "C0123");
    }

    #[test]
    fn test_slack_credentials_reject_placeholder() {
        let err = SlackCredentials::parse(
            r#"{"SLACK_BOT_TOKEN":"dummy","SLACK_CHANNEL_TO_NOTIFY":"C0123"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Secrets(_)));
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_slack_credentials_reject_missing_field() {
        let err = SlackCredentials::parse(r#"{"SLACK_BOT_TOKEN":"xoxb-1"}"#).unwrap_err();
        assert!(err.to_string().contains("Malformed"));
    }

    #[test]
    fn test_plot_config_defaults() {
        let config = PlotConfig::from_lookup(lookup_from(&[("S3_BUCKET_NAME", "assets")])).unwrap();
        assert_eq!(config.bucket_name, "assets");
        assert_eq!(config.file_name, DEFAULT_PLOT_FILE_NAME);
        assert_eq!(config.output_dir, std::env::temp_dir());
    }

    #[test]
    fn test_plot_config_requires_bucket() {
        let err = PlotConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET_NAME not set"));
    }

    #[test]
    fn test_plot_config_rejects_nested_file_name() {
        let err = PlotConfig::from_lookup(lookup_from(&[
            ("S3_BUCKET_NAME", "assets"),
            ("PLOT_FILE_NAME", "plots/out.png"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_notification_config() {
        let config = NotificationConfig::from_lookup(lookup_from(&[
            ("SLACK_CREDENTIALS_SECRET_ID", "SecretA720EF05-abc"),
            ("CLOUD_FRONT_DISTRIBUTION_URL", "https://d111.cloudfront.net"),
        ]))
        .unwrap();
        assert_eq!(config.secret_id, "SecretA720EF05-abc");
        assert_eq!(config.message, DEFAULT_NOTIFICATION_MESSAGE);
        assert!(config.slack_api_base_url.is_none());
    }

    #[test]
    fn test_notification_config_requires_https() {
        let err = NotificationConfig::from_lookup(lookup_from(&[
            ("SLACK_CREDENTIALS_SECRET_ID", "secret"),
            ("CLOUD_FRONT_DISTRIBUTION_URL", "http://d111.cloudfront.net"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("sample.png").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("plot_2024-01.v2.png").is_ok());
    }

    #[test]
    fn test_validate_file_name_rejects_url_unsafe_characters() {
        for name in ["my plot.png", "plot.png?v=2", "plot#1.png", "plöt.png", "a%20b.png"] {
            let err = validate_file_name(name).unwrap_err();
            assert!(matches!(err, Error::InvalidEvent(_)), "{} accepted", name);
        }
    }

    #[test]
    fn test_plot_config_rejects_url_unsafe_file_name() {
        let err = PlotConfig::from_lookup(lookup_from(&[
            ("S3_BUCKET_NAME", "assets"),
            ("PLOT_FILE_NAME", "my plot.png"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
