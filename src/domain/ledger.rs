//! Ledger entries and the bundle their digest commits to

use serde::{Deserialize, Serialize};

use super::{Ciphertext, Digest, Identity, RecordId, StorageLink};

/// One anchored provenance tuple
///
/// Field names are camelCase on the wire in every direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub record_id: RecordId,
    pub creator_identity: Identity,
    pub timestamp_seconds: u64,
    pub digest: Digest,
    /// Empty when the upload was skipped
    pub storage_link: StorageLink,
}

/// The composite the ledger digest commits to
///
/// Canonicalized (sorted keys) before hashing, so field order here is
/// irrelevant to the digest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceBundle<'a> {
    pub encrypted_data: &'a str,
    pub record_id: &'a str,
    /// Lowercased creator identity
    pub creator_identity: String,
    pub storage_link: &'a str,
    pub timestamp_seconds: u64,
}

impl<'a> ProvenanceBundle<'a> {
    pub fn new(
        ciphertext: &'a Ciphertext,
        record_id: &'a RecordId,
        creator: &Identity,
        storage_link: &'a StorageLink,
        timestamp_seconds: u64,
    ) -> Self {
        Self {
            encrypted_data: ciphertext.as_str(),
            record_id: record_id.as_str(),
            creator_identity: creator.normalized(),
            storage_link: storage_link.as_str(),
            timestamp_seconds,
        }
    }

    /// Bundle for re-checking a ledger entry against fetched ciphertext.
    pub fn for_entry(ciphertext: &'a Ciphertext, entry: &'a LedgerEntry) -> Self {
        Self::new(
            ciphertext,
            &entry.record_id,
            &entry.creator_identity,
            &entry.storage_link,
            entry.timestamp_seconds,
        )
    }
}

/// Blob uploaded to the content-addressed store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEnvelope {
    pub encrypted_data: Ciphertext,
}

impl StoredEnvelope {
    pub fn new(ciphertext: Ciphertext) -> Self {
        Self {
            encrypted_data: ciphertext,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
