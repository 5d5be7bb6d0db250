//! Shared request and response types for REST API handlers.

use serde::{Deserialize, Serialize};

use crate::domain::{Digest, LedgerEntry, Record, RecordId, TamperWarning, VerifiedRecord};
use crate::orchestrator::ProvenanceOrchestrator;

/// Response for record verification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub record_id: RecordId,
    pub record: Record,
    pub tamper_warning: Option<TamperWarning>,
    pub expected_digest: Digest,
    pub actual_digest: Digest,
}

impl From<VerifiedRecord> for VerifyResponse {
    fn from(verified: VerifiedRecord) -> Self {
        let expected_digest = verified.entry.digest;
        let actual_digest = verified
            .tamper_warning
            .as_ref()
            .map(|w| w.actual)
            .unwrap_or(expected_digest);
        Self {
            record_id: verified.entry.record_id,
            record: verified.record,
            tamper_warning: verified.tamper_warning,
            expected_digest,
            actual_digest,
        }
    }
}

/// Response for listing ledger entries.
#[derive(Debug, Serialize)]
pub struct ListRecordsResponse {
    pub records: Vec<LedgerEntry>,
    pub count: usize,
}

/// Response for the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub ledger: ComponentStatus,
    pub store: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// Readiness of one pipeline component.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentStatus {
    pub configured: bool,
    pub backend: String,
}

impl HealthResponse {
    pub(crate) fn current(orchestrator: &ProvenanceOrchestrator) -> Self {
        Self {
            status: if orchestrator.is_ledger_ready() {
                "healthy"
            } else {
                "degraded"
            },
            service: "audit-provenance",
            version: env!("CARGO_PKG_VERSION"),
            ledger: ComponentStatus {
                configured: orchestrator.is_ledger_ready(),
                backend: orchestrator.ledger().backend_name().to_string(),
            },
            store: ComponentStatus {
                configured: orchestrator.is_store_configured(),
                backend: orchestrator.store_client().backend_name().to_string(),
            },
            identity: orchestrator.current_identity().map(|i| i.to_string()),
        }
    }
}
