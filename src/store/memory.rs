//! In-memory content-addressed store for tests and local runs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BlobStore, StoreError};
use crate::crypto::sha256;
use crate::domain::StorageLink;

const LINK_PREFIX: &str = "memory://sha256/";

/// Blobs keyed by the SHA-256 of their content
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_for(blob: &[u8]) -> StorageLink {
        let hex = sha256(blob).to_hex();
        StorageLink::new(format!("{LINK_PREFIX}{}", hex.trim_start_matches("0x")))
    }

    /// Replace the bytes behind an existing link.
    ///
    /// Returns false if nothing was stored there.
    pub async fn overwrite(&self, link: &StorageLink, bytes: impl Into<Vec<u8>>) -> bool {
        let mut blobs = self.blobs.write().await;
        match blobs.get_mut(link.as_str()) {
            Some(slot) => {
                *slot = bytes.into();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, blob: &[u8]) -> Result<StorageLink, StoreError> {
        let link = Self::link_for(blob);
        self.blobs
            .write()
            .await
            .entry(link.as_str().to_string())
            .or_insert_with(|| blob.to_vec());
        Ok(link)
    }

    async fn fetch(&self, link: &StorageLink) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .read()
            .await
            .get(link.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(link.clone()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
