//! In-process ledger for tests and local runs

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LedgerBackend, LedgerError, LedgerWriteError};
use crate::domain::{Digest, LedgerEntry, RecordId};

/// Append-only vector of entries
#[derive(Debug)]
pub struct MemoryLedger {
    entries: RwLock<Vec<LedgerEntry>>,
    unique: bool,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Ledger that rejects a second entry for the same record id
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            unique: true,
        }
    }

    /// Ledger that accepts repeated record ids
    pub fn allowing_duplicates() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            unique: false,
        }
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Rewrite the digest of an anchored entry, simulating a forged ledger.
    pub async fn forge_digest(&self, record_id: &RecordId, digest: Digest) -> bool {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| &e.record_id == record_id) {
            Some(entry) => {
                entry.digest = digest;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl LedgerBackend for MemoryLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut entries = self.entries.write().await;
        if self.unique && entries.iter().any(|e| e.record_id == entry.record_id) {
            return Err(LedgerWriteError::Duplicate(entry.record_id.clone()).into());
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
