//! Store flow state machine
//!
//! ```text
//! Idle --encrypt--> Uploading --upload/skip--> Hashing --digest+append--> Anchored --> Complete
//!   \____________________________ any failure ____________________________/
//!                                      v
//!                                 Error(kind) --reset--> Idle
//! ```
//!
//! Each step awaits its I/O before the next one can start. A failed flow
//! refuses further steps until it is reset; nothing is retried.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::Components;
use crate::crypto::digest_serializable;
use crate::domain::{
    Ciphertext, Identity, LedgerEntry, ProvenanceBundle, RecordId, StorageOutcome, StoreReceipt,
    StoreRequest, StoredEnvelope,
};
use crate::infra::{ErrorKind, ProvenanceError, Result};

/// Observable state of a store flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    Uploading,
    Hashing,
    Anchored,
    Complete,
    Error(ErrorKind),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Complete | FlowState::Error(_))
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::Idle => write!(f, "idle"),
            FlowState::Uploading => write!(f, "uploading"),
            FlowState::Hashing => write!(f, "hashing"),
            FlowState::Anchored => write!(f, "anchored"),
            FlowState::Complete => write!(f, "complete"),
            FlowState::Error(kind) => write!(f, "error({kind})"),
        }
    }
}

/// Work carried from one step to the next
#[derive(Debug, Default)]
struct Progress {
    creator: Option<Identity>,
    identity_rx: Option<watch::Receiver<Option<Identity>>>,
    ciphertext: Option<Ciphertext>,
    storage: Option<StorageOutcome>,
    entry: Option<LedgerEntry>,
    receipt: Option<StoreReceipt>,
}

/// A single store flow
pub struct StoreFlow {
    components: Arc<Components>,
    request: StoreRequest,
    record_id: RecordId,
    state_tx: watch::Sender<FlowState>,
    progress: Progress,
}

impl StoreFlow {
    pub(super) fn new(components: Arc<Components>, request: StoreRequest) -> Self {
        let record_id = request.record_id.clone().unwrap_or_else(RecordId::generate);
        let (state_tx, _) = watch::channel(FlowState::Idle);
        Self {
            components,
            request,
            record_id,
            state_tx,
            progress: Progress::default(),
        }
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn state(&self) -> FlowState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state_tx.subscribe()
    }

    /// Receipt of a completed flow
    pub fn receipt(&self) -> Option<&StoreReceipt> {
        self.progress.receipt.as_ref()
    }

    /// Return an errored flow to `Idle`, discarding partial work.
    ///
    /// Entries already appended to the ledger stay there.
    pub fn reset(&mut self) -> Result<()> {
        match self.state() {
            FlowState::Error(_) => {
                self.progress = Progress::default();
                self.publish(FlowState::Idle);
                Ok(())
            }
            other => Err(ProvenanceError::InvalidTransition {
                from: other.to_string(),
                reason: "only a failed flow can be reset".to_string(),
            }),
        }
    }

    /// Run the remaining steps to completion
    pub async fn run(&mut self) -> Result<StoreReceipt> {
        loop {
            if let Some(receipt) = &self.progress.receipt {
                return Ok(receipt.clone());
            }
            self.step().await?;
        }
    }

    /// Advance exactly one step
    pub async fn step(&mut self) -> Result<FlowState> {
        let from = self.state();
        let result = match from {
            FlowState::Idle => self.encrypt(),
            FlowState::Uploading => self.upload().await,
            FlowState::Hashing => self.anchor().await,
            FlowState::Anchored => self.complete(),
            FlowState::Complete => {
                return Err(ProvenanceError::InvalidTransition {
                    from: from.to_string(),
                    reason: "flow already complete".to_string(),
                })
            }
            FlowState::Error(_) => {
                return Err(ProvenanceError::InvalidTransition {
                    from: from.to_string(),
                    reason: "flow failed; reset before running again".to_string(),
                })
            }
        };

        match result {
            Ok(next) => {
                self.publish(next);
                Ok(next)
            }
            Err(e) => {
                let kind = e.kind();
                warn!(
                    record_id = %self.record_id,
                    from = %from,
                    kind = %kind,
                    error = %e,
                    "Store flow failed"
                );
                self.publish(FlowState::Error(kind));
                Err(e)
            }
        }
    }

    fn publish(&self, state: FlowState) {
        self.state_tx.send_replace(state);
    }

    /// Fail if the connected identity moved away from the one bound at start
    fn check_identity(&mut self) -> Result<&Identity> {
        let bound = self
            .progress
            .creator
            .as_ref()
            .ok_or(ProvenanceError::MissingIdentity)?;
        if let Some(rx) = self.progress.identity_rx.as_mut() {
            let current = rx.borrow_and_update().clone();
            if !current.as_ref().is_some_and(|c| c.matches(bound)) {
                return Err(ProvenanceError::IdentityChanged {
                    bound: bound.clone(),
                    current,
                });
            }
        }
        Ok(bound)
    }

    /// Idle -> Uploading
    fn encrypt(&mut self) -> Result<FlowState> {
        if !self.components.ledger.is_ready() {
            return Err(crate::ledger::LedgerError::NotConfigured.into());
        }
        if self.record_id.is_empty() {
            return Err(ProvenanceError::InvalidRequest(
                "record id must not be empty".to_string(),
            ));
        }

        let identity_rx = self.components.identity.changes();
        let creator = identity_rx
            .borrow()
            .clone()
            .ok_or(ProvenanceError::MissingIdentity)?;

        let ciphertext =
            self.components
                .cipher
                .encrypt(&self.request.record, &creator, &self.record_id)?;

        info!(record_id = %self.record_id, creator = %creator, "Record encrypted");
        self.progress.creator = Some(creator);
        self.progress.identity_rx = Some(identity_rx);
        self.progress.ciphertext = Some(ciphertext);
        Ok(FlowState::Uploading)
    }

    /// Uploading -> Hashing
    async fn upload(&mut self) -> Result<FlowState> {
        self.check_identity()?;
        let ciphertext = self.ciphertext()?;

        let storage = if self.components.store.is_configured() {
            let blob = StoredEnvelope::new(ciphertext.clone())
                .to_bytes()
                .map_err(|e| crate::store::StoreError::InvalidBlob(e.to_string()))?;
            let link = self.components.store.upload(&blob).await?;
            info!(record_id = %self.record_id, link = %link, "Encrypted record stored");
            StorageOutcome::Stored(link)
        } else {
            info!(record_id = %self.record_id, "No store configured; upload skipped");
            StorageOutcome::Skipped
        };

        self.progress.storage = Some(storage);
        Ok(FlowState::Hashing)
    }

    /// Hashing -> Anchored
    async fn anchor(&mut self) -> Result<FlowState> {
        let creator = self.check_identity()?.clone();
        let ciphertext = self.ciphertext()?;
        let link = self
            .progress
            .storage
            .as_ref()
            .map(StorageOutcome::link)
            .unwrap_or_default();
        let timestamp_seconds = self.components.clock.now_seconds();

        let digest = digest_serializable(&ProvenanceBundle::new(
            ciphertext,
            &self.record_id,
            &creator,
            &link,
            timestamp_seconds,
        ))?;

        let entry = LedgerEntry {
            record_id: self.record_id.clone(),
            creator_identity: creator,
            timestamp_seconds,
            digest,
            storage_link: link,
        };
        self.components.ledger.append(&entry).await?;

        self.progress.entry = Some(entry);
        Ok(FlowState::Anchored)
    }

    /// Anchored -> Complete
    ///
    /// The anchor is already committed, so an identity switch no longer
    /// invalidates the flow.
    fn complete(&mut self) -> Result<FlowState> {
        let (Some(entry), Some(storage), Some(ciphertext)) = (
            self.progress.entry.clone(),
            self.progress.storage.clone(),
            self.progress.ciphertext.clone(),
        ) else {
            return Err(self.out_of_order("anchored flow is missing its entry"));
        };

        info!(
            record_id = %entry.record_id,
            digest = %entry.digest,
            skipped = storage.is_skipped(),
            "Store flow complete"
        );

        self.progress.receipt = Some(StoreReceipt {
            record_id: entry.record_id.clone(),
            storage_link: entry.storage_link.clone(),
            storage,
            digest: entry.digest,
            ciphertext,
            timestamp_seconds: entry.timestamp_seconds,
            entry,
        });
        Ok(FlowState::Complete)
    }

    fn ciphertext(&self) -> Result<&Ciphertext> {
        self.progress
            .ciphertext
            .as_ref()
            .ok_or_else(|| self.out_of_order("no ciphertext produced"))
    }

    fn out_of_order(&self, reason: &str) -> ProvenanceError {
        ProvenanceError::InvalidTransition {
            from: self.state().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Debug for StoreFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreFlow")
            .field("record_id", &self.record_id)
            .field("state", &self.state())
            .finish()
    }
}
