use super::AssetStore;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

pub struct S3AssetStore {
    client: S3Client,
    bucket: String,
}

impl S3AssetStore {
    /// Build a store from the default credential chain (the function's execution role).
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(S3Client::new(&config), bucket)
    }

    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let body = ByteStream::from(data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to upload s3://{}/{}: {}", self.bucket, key, e);
                Error::Storage(format!("Failed to upload {}: {}", key, e))
            })?;

        Ok(())
    }
}
