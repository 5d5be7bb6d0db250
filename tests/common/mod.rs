//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use audit_provenance::crypto::IdentityCipher;
use audit_provenance::domain::{Identity, StorageLink};
use audit_provenance::identity::SwitchableIdentity;
use audit_provenance::infra::FixedClock;
use audit_provenance::ledger::{LedgerClient, MemoryLedger};
use audit_provenance::store::{BlobStore, MemoryBlobStore, StoreClient, StoreError};
use audit_provenance::ProvenanceOrchestrator;

/// Creator of the fixture records
pub const OWNER: &str = "0x1111111111111111111111111111111111111111";

/// Some other account
pub const OTHER: &str = "0x2222222222222222222222222222222222222222";

/// Fixed ledger time for deterministic entries
pub const T0: u64 = 1_700_000_000;

/// Low iteration count so tests stay fast
pub fn fast_cipher() -> Arc<IdentityCipher> {
    Arc::new(IdentityCipher::with_iterations(1_000).unwrap())
}

/// A representative audit report
pub fn audit_report(title: &str) -> serde_json::Value {
    json!({
        "title": title,
        "auditor": "Example Assurance LLP",
        "period": {"from": "2024-01-01", "to": "2024-12-31"},
        "findings": [
            {"id": "F-1", "severity": "high", "summary": "Segregation of duties gap"},
            {"id": "F-2", "severity": "low", "summary": "Stale access review"}
        ],
        "score": 87.5,
        "signedOff": true
    })
}

/// Blob store wrapper counting calls
#[derive(Default)]
pub struct RecordingBlobStore {
    pub inner: MemoryBlobStore,
    pub uploads: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl RecordingBlobStore {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn upload(&self, blob: &[u8]) -> Result<StorageLink, StoreError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner.upload(blob).await
    }

    async fn fetch(&self, link: &StorageLink) -> Result<Vec<u8>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(link).await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Orchestrator over in-memory backends with handles to each of them
pub struct Harness {
    pub orchestrator: ProvenanceOrchestrator,
    pub store: Arc<RecordingBlobStore>,
    pub ledger: Arc<MemoryLedger>,
    pub identity: Arc<SwitchableIdentity>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Store and ledger configured, `OWNER` connected
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Ledger configured, no blob store
    pub fn without_store() -> Self {
        Self::build(false)
    }

    fn build(with_store: bool) -> Self {
        let store = Arc::new(RecordingBlobStore::default());
        let ledger = Arc::new(MemoryLedger::new());
        let identity = Arc::new(SwitchableIdentity::new(Some(Identity::new(OWNER))));
        let clock = Arc::new(FixedClock::new(T0));

        let store_client = if with_store {
            StoreClient::new(store.clone())
        } else {
            StoreClient::unconfigured()
        };

        let orchestrator = ProvenanceOrchestrator::builder()
            .cipher(fast_cipher())
            .store(store_client)
            .ledger(LedgerClient::new(ledger.clone()))
            .identity(identity.clone())
            .clock(clock.clone())
            .build();

        Self {
            orchestrator,
            store,
            ledger,
            identity,
            clock,
        }
    }
}
