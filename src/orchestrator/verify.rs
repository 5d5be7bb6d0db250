//! Verify flow
//!
//! 1. Look up the ledger entry.
//! 2. Gate on the creator: a non-creator gets nothing fetched or decrypted.
//! 3. Fetch and unwrap the stored ciphertext.
//! 4. Recompute the bundle digest; a mismatch is a non-fatal warning.
//! 5. Decrypt. If that fails too, the warning travels inside the error.

use tracing::{info, instrument, warn};

use super::ProvenanceOrchestrator;
use crate::crypto::digest_serializable;
use crate::domain::{Identity, ProvenanceBundle, RecordId, TamperWarning, VerifiedRecord};
use crate::infra::{ProvenanceError, Result};

impl ProvenanceOrchestrator {
    /// Verify a record as the connected identity
    pub async fn verify(&self, record_id: &RecordId) -> Result<VerifiedRecord> {
        let caller = self
            .components
            .identity
            .current()
            .ok_or(ProvenanceError::MissingIdentity)?;
        self.verify_as(&caller, record_id).await
    }

    /// Verify a record as an explicit caller identity
    #[instrument(skip_all, fields(caller = %caller, record_id = %record_id))]
    pub async fn verify_as(&self, caller: &Identity, record_id: &RecordId) -> Result<VerifiedRecord> {
        let entry = self
            .components
            .ledger
            .find(record_id)
            .await?
            .ok_or_else(|| ProvenanceError::RecordNotFound(record_id.clone()))?;

        if !caller.matches(&entry.creator_identity) {
            warn!(creator = %entry.creator_identity, "Verify refused: caller is not the creator");
            return Err(ProvenanceError::NotAuthorized {
                record_id: record_id.clone(),
                caller: caller.clone(),
            });
        }

        if entry.storage_link.is_empty() {
            return Err(ProvenanceError::NotStored(record_id.clone()));
        }

        let ciphertext = self.components.store.fetch(&entry.storage_link).await?;

        let actual = digest_serializable(&ProvenanceBundle::for_entry(&ciphertext, &entry))?;
        let tamper_warning = (actual != entry.digest).then(|| TamperWarning {
            record_id: record_id.clone(),
            expected: entry.digest,
            actual,
        });
        if let Some(warning) = &tamper_warning {
            warn!(expected = %warning.expected, actual = %warning.actual, "Digest mismatch");
        }

        match self
            .components
            .cipher
            .decrypt(&ciphertext, &entry.creator_identity, record_id)
        {
            Ok(record) => {
                info!(intact = tamper_warning.is_none(), "Record verified");
                Ok(VerifiedRecord {
                    record,
                    entry,
                    tamper_warning,
                })
            }
            Err(source) => match tamper_warning {
                Some(warning) => Err(ProvenanceError::TamperDetected { warning, source }),
                None => Err(source.into()),
            },
        }
    }
}
