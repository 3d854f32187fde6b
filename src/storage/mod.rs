//! Blob storage seam: store bytes at a key, get back a time-limited fetch
//! URL. The HTTP-backed implementation lives in `crate::http`; the
//! in-memory store here backs tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("storage returned an invalid url: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key` and return a fetch URL valid for a bounded
    /// time window.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError>;
}

/// In-memory store. URLs use a `memory://` scheme and never expire.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://{key}"))
    }
}
