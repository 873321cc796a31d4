use super::AssetStore;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone)]
pub struct MockAssetStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    upload_count: Arc<Mutex<usize>>,
    failures_remaining: Arc<Mutex<usize>>,
}

impl MockAssetStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            upload_count: Arc::new(Mutex::new(0)),
            failures_remaining: Arc::new(Mutex::new(0)),
        }
    }

    /// Fail the next `count` uploads before accepting any.
    pub fn with_failures(self, count: usize) -> Self {
        *self.failures_remaining.lock().unwrap() = count;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MockAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetStore for MockAssetStore {
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        *self.upload_count.lock().unwrap() += 1;

        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(crate::Error::Storage(format!(
                    "Mock upload failure for {}",
                    key
                )));
            }
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
