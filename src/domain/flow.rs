//! Inputs and outputs of the store and verify flows

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Ciphertext, Digest, LedgerEntry, Record, RecordId, StorageLink, StorageOutcome};

/// Request to run a store flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRequest {
    /// Generated when absent
    #[serde(default)]
    pub record_id: Option<RecordId>,
    pub record: Record,
}

impl StoreRequest {
    pub fn new(record: Record) -> Self {
        Self {
            record_id: None,
            record,
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<RecordId>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

/// Result of a completed store flow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReceipt {
    pub record_id: RecordId,
    pub storage: StorageOutcome,
    /// Empty when the upload was skipped
    pub storage_link: StorageLink,
    pub digest: Digest,
    pub ciphertext: Ciphertext,
    pub timestamp_seconds: u64,
    pub entry: LedgerEntry,
}

/// Non-fatal report that fetched content no longer matches the anchored digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TamperWarning {
    pub record_id: RecordId,
    /// Digest recorded on the ledger
    pub expected: Digest,
    /// Digest recomputed from the fetched content
    pub actual: Digest,
}

impl fmt::Display for TamperWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {} digest mismatch: ledger {}, fetched {}",
            self.record_id, self.expected, self.actual
        )
    }
}

/// Result of a verify flow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedRecord {
    pub record: Record,
    pub entry: LedgerEntry,
    pub tamper_warning: Option<TamperWarning>,
}

impl VerifiedRecord {
    pub fn is_intact(&self) -> bool {
        self.tamper_warning.is_none()
    }
}
