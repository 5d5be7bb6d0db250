//! Ledger anchoring
//!
//! An append-only ledger records `{recordId, creatorIdentity, timestampSeconds,
//! digest, storageLink}` tuples. `LedgerBackend` is the seam to a concrete
//! ledger; `LedgerClient` wraps an optional backend, fails fast when none is
//! configured, and exposes enumeration as a lazily paged stream.

mod contract;
mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info, instrument, warn};

use crate::domain::{LedgerEntry, RecordId};

pub use contract::{ContractLedger, ContractLedgerConfig};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

/// Default number of entries fetched per page
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Reasons a ledger append was refused
#[derive(Debug, thiserror::Error)]
pub enum LedgerWriteError {
    #[error("ledger rejected the entry: {0}")]
    Rejected(String),

    #[error("record {0} is already anchored")]
    Duplicate(RecordId),

    #[error("entry creator {creator} does not match ledger signer {signer}")]
    Unauthorized { creator: String, signer: String },

    #[error("ledger transport failure: {0}")]
    Transport(String),
}

/// Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger is not configured")]
    NotConfigured,

    #[error("ledger write failed: {0}")]
    Write(#[from] LedgerWriteError),

    #[error("ledger read failed: {0}")]
    Read(String),

    #[error("ledger misconfigured: {0}")]
    Configuration(String),
}

/// Append-only ledger backend
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Append an entry. Appends are final.
    async fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError>;

    /// Entries `[offset, offset + limit)` in backend enumeration order
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// First entry for a record id
    ///
    /// The default scans pages; backends with an index override it.
    async fn find(&self, record_id: &RecordId) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut offset = 0;
        loop {
            let page = self.fetch_page(offset, DEFAULT_PAGE_SIZE).await?;
            if let Some(entry) = page.iter().find(|e| &e.record_id == record_id) {
                return Ok(Some(entry.clone()));
            }
            if (page.len() as u64) < DEFAULT_PAGE_SIZE {
                return Ok(None);
            }
            offset += page.len() as u64;
        }
    }

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Client over an optional ledger backend
#[derive(Clone)]
pub struct LedgerClient {
    backend: Option<Arc<dyn LedgerBackend>>,
    page_size: u64,
}

type PageState = (Option<Arc<dyn LedgerBackend>>, u64, bool);

async fn next_page(
    (backend, offset, done): PageState,
    page_size: u64,
) -> Result<Option<(Vec<LedgerEntry>, PageState)>, LedgerError> {
    if done {
        return Ok(None);
    }
    let backend = backend.ok_or(LedgerError::NotConfigured)?;
    let page = backend.fetch_page(offset, page_size).await?;
    if page.is_empty() {
        return Ok(None);
    }
    debug!(offset, fetched = page.len(), "Ledger page fetched");
    let next_offset = offset + page.len() as u64;
    let done = (page.len() as u64) < page_size;
    Ok(Some((page, (Some(backend), next_offset, done))))
}

impl LedgerClient {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            backend: Some(backend),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Client with no backend; every operation fails with `NotConfigured`.
    pub fn unconfigured() -> Self {
        Self {
            backend: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("none")
    }

    fn backend(&self) -> Result<&Arc<dyn LedgerBackend>, LedgerError> {
        self.backend.as_ref().ok_or(LedgerError::NotConfigured)
    }

    /// Anchor an entry
    #[instrument(skip(self, entry), fields(backend = self.backend_name(), record_id = %entry.record_id))]
    pub async fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let backend = self.backend()?;
        match backend.append(entry).await {
            Ok(()) => {
                info!(digest = %entry.digest, "Entry anchored");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Ledger append failed");
                Err(e)
            }
        }
    }

    /// Direct lookup by record id
    #[instrument(skip(self), fields(backend = self.backend_name()))]
    pub async fn find(&self, record_id: &RecordId) -> Result<Option<LedgerEntry>, LedgerError> {
        self.backend()?.find(record_id).await
    }

    /// All entries, fetched page by page as the stream is polled.
    ///
    /// Enumeration order is whatever the backend returns.
    pub fn list_all(&self) -> BoxStream<'static, Result<LedgerEntry, LedgerError>> {
        let page_size = self.page_size;
        stream::try_unfold((self.backend.clone(), 0u64, false), move |state| {
            next_page(state, page_size)
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, LedgerError>)))
        .try_flatten()
        .boxed()
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("backend", &self.backend_name())
            .field("page_size", &self.page_size)
            .finish()
    }
}
