//! Asset bucket access
//!
//! Objects written here are served to the outside world only through the CDN
//! origin-access identity; uploads never set a public ACL.

pub mod client;
pub mod mock;

pub use client::S3AssetStore;
pub use mock::MockAssetStore;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;
}
