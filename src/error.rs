//! Error handling and custom error types
//!
//! Provides unified error handling across both compute units and the local
//! workflow tooling using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("S3 error: {0}")]
    Storage(String),

    #[error("Secrets Manager error: {0}")]
    Secrets(String),

    #[error("Slack API error: {0}")]
    Slack(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
