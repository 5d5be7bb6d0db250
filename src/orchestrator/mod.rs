//! Provenance orchestrator
//!
//! Ties the cipher, store client, hasher and ledger client into the store
//! flow (encrypt, upload, hash, anchor) and the verify flow (look up, gate,
//! fetch, re-hash, decrypt).

mod state;
mod verify;

use std::sync::Arc;

use futures::stream::BoxStream;

use crate::crypto::{IdentityCipher, RecordCipher};
use crate::domain::{Identity, LedgerEntry, RecordId, StoreReceipt, StoreRequest};
use crate::identity::{IdentityProvider, StaticIdentity};
use crate::infra::{Clock, Result, SystemClock};
use crate::ledger::{LedgerClient, LedgerError};
use crate::store::StoreClient;

pub use state::{FlowState, StoreFlow};

/// Capabilities shared by every flow
pub(crate) struct Components {
    pub(crate) cipher: Arc<dyn RecordCipher>,
    pub(crate) store: StoreClient,
    pub(crate) ledger: LedgerClient,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) clock: Arc<dyn Clock>,
}

/// Entry point for store and verify flows
#[derive(Clone)]
pub struct ProvenanceOrchestrator {
    components: Arc<Components>,
}

impl ProvenanceOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Start a store flow in `Idle`
    pub fn begin_store(&self, request: StoreRequest) -> StoreFlow {
        StoreFlow::new(self.components.clone(), request)
    }

    /// Run a store flow to completion
    pub async fn store(&self, request: StoreRequest) -> Result<StoreReceipt> {
        self.begin_store(request).run().await
    }

    /// Currently connected identity
    pub fn current_identity(&self) -> Option<Identity> {
        self.components.identity.current()
    }

    pub fn is_ledger_ready(&self) -> bool {
        self.components.ledger.is_ready()
    }

    pub fn is_store_configured(&self) -> bool {
        self.components.store.is_configured()
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.components.ledger
    }

    pub fn store_client(&self) -> &StoreClient {
        &self.components.store
    }

    /// Ledger entry for a record id
    pub async fn entry(&self, record_id: &RecordId) -> Result<Option<LedgerEntry>> {
        Ok(self.components.ledger.find(record_id).await?)
    }

    /// Every ledger entry, paged lazily
    pub fn entries(&self) -> BoxStream<'static, std::result::Result<LedgerEntry, LedgerError>> {
        self.components.ledger.list_all()
    }
}

impl std::fmt::Debug for ProvenanceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvenanceOrchestrator")
            .field("store", &self.components.store)
            .field("ledger", &self.components.ledger)
            .finish()
    }
}

/// Builder for [`ProvenanceOrchestrator`]
///
/// Defaults: `IdentityCipher`, no store, no ledger, no identity, wall clock.
#[derive(Default)]
pub struct OrchestratorBuilder {
    cipher: Option<Arc<dyn RecordCipher>>,
    store: Option<StoreClient>,
    ledger: Option<LedgerClient>,
    identity: Option<Arc<dyn IdentityProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl OrchestratorBuilder {
    pub fn cipher(mut self, cipher: Arc<dyn RecordCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn store(mut self, store: StoreClient) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ledger(mut self, ledger: LedgerClient) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> ProvenanceOrchestrator {
        let components = Components {
            cipher: self
                .cipher
                .unwrap_or_else(|| Arc::new(IdentityCipher::default())),
            store: self.store.unwrap_or_else(StoreClient::unconfigured),
            ledger: self.ledger.unwrap_or_else(LedgerClient::unconfigured),
            identity: self
                .identity
                .unwrap_or_else(|| Arc::new(StaticIdentity::none())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };
        ProvenanceOrchestrator {
            components: Arc::new(components),
        }
    }
}
