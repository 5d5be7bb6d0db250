//! Content-addressed blob storage
//!
//! `BlobStore` backends upload bytes and hand back a content-derived link.
//! `StoreClient` wraps an optional backend and applies envelope unwrapping
//! to everything it fetches.

pub mod envelope;
mod memory;
mod pinning;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, instrument};

use crate::domain::{Ciphertext, StorageLink};
use crate::infra::Result;

pub use envelope::{normalize_fetched, UnwrapError};
pub use memory::MemoryBlobStore;
pub use pinning::{PinningConfig, PinningStore};

/// Errors from a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("content not found at {0}")]
    NotFound(StorageLink),

    #[error("invalid blob: {0}")]
    InvalidBlob(String),

    #[error("no storage backend configured")]
    NotConfigured,
}

/// Upload/fetch backend for a content-addressed store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes and return their link
    async fn upload(&self, blob: &[u8]) -> std::result::Result<StorageLink, StoreError>;

    /// Fetch the raw bytes behind a link
    async fn fetch(&self, link: &StorageLink) -> std::result::Result<Vec<u8>, StoreError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Client over an optional blob store
#[derive(Clone, Default)]
pub struct StoreClient {
    backend: Option<Arc<dyn BlobStore>>,
}

impl StoreClient {
    pub fn new(backend: Arc<dyn BlobStore>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Client with no backend; uploads are skipped by the store flow.
    pub fn unconfigured() -> Self {
        Self { backend: None }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("none")
    }

    fn backend(&self) -> std::result::Result<&Arc<dyn BlobStore>, StoreError> {
        self.backend
            .as_ref()
            .ok_or(StoreError::NotConfigured)
    }

    /// Upload a blob. No retry.
    #[instrument(skip(self, blob), fields(backend = self.backend_name(), bytes = blob.len()))]
    pub async fn upload(&self, blob: &[u8]) -> Result<StorageLink> {
        if blob.is_empty() {
            return Err(StoreError::InvalidBlob("empty blob".to_string()).into());
        }
        let link = self.backend()?.upload(blob).await?;
        debug!(link = %link, "Blob uploaded");
        Ok(link)
    }

    /// Fetch a blob and unwrap it to the contained ciphertext.
    #[instrument(skip(self), fields(backend = self.backend_name()))]
    pub async fn fetch(&self, link: &StorageLink) -> Result<Ciphertext> {
        let bytes = self.backend()?.fetch(link).await?;
        debug!(bytes = bytes.len(), "Blob fetched");
        Ok(normalize_fetched(&bytes)?)
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("backend", &self.backend_name())
            .finish()
    }
}
