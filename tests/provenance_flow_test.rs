//! End-to-end store and verify flows over in-memory backends.

mod common;

use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::json;

use audit_provenance::crypto::RecordCipher;
use audit_provenance::domain::{
    Ciphertext, Digest, Identity, RecordId, StoreRequest, StoredEnvelope,
};
use audit_provenance::ledger::{LedgerClient, MemoryLedger};
use audit_provenance::{ErrorKind, FlowState, ProvenanceError, ProvenanceOrchestrator};

use common::*;

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_store_then_verify_returns_original_record() {
    let h = Harness::new();
    let record = json!({"vendor": "Acme", "amount": 42.50});

    let receipt = h
        .orchestrator
        .store(StoreRequest::new(record.clone()).with_record_id("aud-1"))
        .await
        .unwrap();

    let entries = h.ledger.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record_id, RecordId::new("aud-1"));
    assert_eq!(entries[0].creator_identity, Identity::new(OWNER));
    assert_eq!(entries[0].timestamp_seconds, T0);
    assert_eq!(receipt.digest.to_string().len(), Digest::TEXT_LEN);
    assert!(!receipt.storage.is_skipped());
    assert_eq!(h.store.uploads(), 1);

    let verified = h.orchestrator.verify(&RecordId::new("aud-1")).await.unwrap();
    assert_eq!(verified.record, record);
    assert!(verified.is_intact());
}

#[tokio::test]
async fn test_store_without_blob_store_skips_upload() {
    let h = Harness::without_store();

    let mut flow = h
        .orchestrator
        .begin_store(StoreRequest::new(audit_report("no store")).with_record_id("aud-1"));
    let receipt = flow.run().await.unwrap();

    assert_eq!(flow.state(), FlowState::Complete);
    assert!(receipt.storage.is_skipped());
    assert!(receipt.storage_link.is_empty());
    assert!(h.ledger.entries().await[0].storage_link.is_empty());

    let err = h.orchestrator.verify(&RecordId::new("aud-1")).await.unwrap_err();
    assert!(matches!(err, ProvenanceError::NotStored(_)));
}

#[tokio::test]
async fn test_non_creator_is_refused_without_fetch() {
    let h = Harness::new();
    h.orchestrator
        .store(StoreRequest::new(audit_report("private")).with_record_id("aud-1"))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .verify_as(&Identity::new(OTHER), &RecordId::new("aud-1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert_eq!(h.store.fetches(), 0);
}

#[tokio::test]
async fn test_creator_match_ignores_case() {
    let h = Harness::new();
    h.orchestrator
        .store(StoreRequest::new(audit_report("case")).with_record_id("aud-1"))
        .await
        .unwrap();

    let shouting = Identity::new(OWNER.to_uppercase().replacen("0X", "0x", 1));
    let verified = h
        .orchestrator
        .verify_as(&shouting, &RecordId::new("aud-1"))
        .await
        .unwrap();
    assert!(verified.is_intact());
}

// ============================================================================
// Tamper evidence
// ============================================================================

#[tokio::test]
async fn test_corrupted_blob_is_tamper_detected() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .store(StoreRequest::new(audit_report("tamper")).with_record_id("aud-1"))
        .await
        .unwrap();

    let mut corrupted = receipt.ciphertext.as_str().to_string();
    corrupted.replace_range(..4, "AAAA");
    let blob = StoredEnvelope::new(Ciphertext::new(corrupted)).to_bytes().unwrap();
    assert!(h.store.inner.overwrite(&receipt.storage_link, blob).await);

    let err = h.orchestrator.verify(&RecordId::new("aud-1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Tamper);
    let warning = err.tamper_warning().unwrap();
    assert_eq!(warning.expected, receipt.digest);
    assert_ne!(warning.actual, receipt.digest);
}

#[tokio::test]
async fn test_any_flipped_ciphertext_byte_is_reported() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .store(StoreRequest::new(audit_report("flip")).with_record_id("aud-1"))
        .await
        .unwrap();
    let record_id = RecordId::new("aud-1");

    let stored = StoredEnvelope::new(receipt.ciphertext.clone()).to_bytes().unwrap();
    let start = String::from_utf8(stored.clone())
        .unwrap()
        .find(receipt.ciphertext.as_str())
        .unwrap();
    let end = start + receipt.ciphertext.as_str().len();

    for pos in start..end {
        for mask in [0x01u8, 0x80, 0xff] {
            let mut flipped = stored.clone();
            flipped[pos] ^= mask;
            assert!(h.store.inner.overwrite(&receipt.storage_link, flipped).await);

            match h.orchestrator.verify(&record_id).await {
                Ok(verified) => assert!(
                    !verified.is_intact(),
                    "flip {mask:#04x} at {pos} verified intact"
                ),
                Err(err) => {
                    assert_eq!(err.kind(), ErrorKind::Tamper, "flip {mask:#04x} at {pos}: {err}");
                    assert!(err.tamper_warning().is_some());
                }
            }
        }
    }

    assert!(h.store.inner.overwrite(&receipt.storage_link, stored).await);
    assert!(h.orchestrator.verify(&record_id).await.unwrap().is_intact());
}

#[tokio::test]
async fn test_swapped_blob_decrypts_with_warning() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .store(StoreRequest::new(audit_report("original")).with_record_id("aud-1"))
        .await
        .unwrap();

    // a different record sealed for the same creator and record id
    let substitute = json!({"title": "substitute"});
    let ciphertext = fast_cipher()
        .encrypt(&substitute, &Identity::new(OWNER), &RecordId::new("aud-1"))
        .unwrap();
    let blob = StoredEnvelope::new(ciphertext).to_bytes().unwrap();
    h.store.inner.overwrite(&receipt.storage_link, blob).await;

    let verified = h.orchestrator.verify(&RecordId::new("aud-1")).await.unwrap();
    assert_eq!(verified.record, substitute);
    assert!(!verified.is_intact());
}

#[tokio::test]
async fn test_forged_ledger_digest_is_reported() {
    let h = Harness::new();
    let record = audit_report("forged");
    h.orchestrator
        .store(StoreRequest::new(record.clone()).with_record_id("aud-1"))
        .await
        .unwrap();
    h.ledger
        .forge_digest(&RecordId::new("aud-1"), Digest([0xee; 32]))
        .await;

    let verified = h.orchestrator.verify(&RecordId::new("aud-1")).await.unwrap();
    assert_eq!(verified.record, record);
    let warning = verified.tamper_warning.unwrap();
    assert_eq!(warning.expected, Digest([0xee; 32]));
}

#[tokio::test]
async fn test_raw_ciphertext_blob_still_verifies() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .store(StoreRequest::new(audit_report("raw")).with_record_id("aud-1"))
        .await
        .unwrap();

    // gateways sometimes hand back the bare string instead of the envelope
    h.store
        .inner
        .overwrite(&receipt.storage_link, receipt.ciphertext.as_str().as_bytes())
        .await;

    let verified = h.orchestrator.verify(&RecordId::new("aud-1")).await.unwrap();
    assert!(verified.is_intact());
}

// ============================================================================
// Flow state machine
// ============================================================================

#[tokio::test]
async fn test_flow_publishes_each_state() {
    let h = Harness::new();
    let mut flow = h
        .orchestrator
        .begin_store(StoreRequest::new(audit_report("states")));
    let mut rx = flow.subscribe();
    assert_eq!(*rx.borrow_and_update(), FlowState::Idle);

    let mut seen = Vec::new();
    while !flow.state().is_terminal() {
        flow.step().await.unwrap();
        seen.push(*rx.borrow_and_update());
    }

    assert_eq!(
        seen,
        vec![
            FlowState::Uploading,
            FlowState::Hashing,
            FlowState::Anchored,
            FlowState::Complete,
        ]
    );
    assert!(flow.receipt().is_some());
    assert!(flow.record_id().as_str().starts_with("audit-"));
}

#[tokio::test]
async fn test_identity_switch_invalidates_flow() {
    let h = Harness::new();
    let mut flow = h
        .orchestrator
        .begin_store(StoreRequest::new(audit_report("switch")).with_record_id("aud-1"));

    assert_eq!(flow.step().await.unwrap(), FlowState::Uploading);
    h.identity.switch_to(OTHER);

    let err = flow.step().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdentityChanged);
    assert_eq!(flow.state(), FlowState::Error(ErrorKind::IdentityChanged));
    assert_eq!(h.store.uploads(), 0);
    assert!(h.ledger.is_empty().await);
}

#[tokio::test]
async fn test_identity_switch_after_anchor_still_completes() {
    let h = Harness::new();
    let mut flow = h
        .orchestrator
        .begin_store(StoreRequest::new(audit_report("anchored")).with_record_id("aud-1"));

    while flow.state() != FlowState::Anchored {
        flow.step().await.unwrap();
    }
    h.identity.switch_to(OTHER);

    assert_eq!(flow.step().await.unwrap(), FlowState::Complete);
    let receipt = flow.receipt().unwrap();
    assert_eq!(receipt.entry.creator_identity, Identity::new(OWNER));
    assert_eq!(h.ledger.len().await, 1);
    assert_eq!(h.ledger.entries().await[0].digest, receipt.digest);
}

#[tokio::test]
async fn test_failed_flow_resets_and_reruns() {
    let h = Harness::new();
    let mut flow = h
        .orchestrator
        .begin_store(StoreRequest::new(audit_report("retry")).with_record_id("aud-1"));

    flow.step().await.unwrap();
    h.identity.disconnect();
    flow.step().await.unwrap_err();

    let refused = flow.run().await.unwrap_err();
    assert_eq!(refused.kind(), ErrorKind::InvalidTransition);

    h.identity.switch_to(OTHER);
    flow.reset().unwrap();
    assert_eq!(flow.state(), FlowState::Idle);

    let receipt = flow.run().await.unwrap();
    assert_eq!(receipt.entry.creator_identity, Identity::new(OTHER));
    assert_eq!(h.ledger.len().await, 1);
}

#[tokio::test]
async fn test_reset_refused_for_healthy_flow() {
    let h = Harness::new();
    let mut flow = h
        .orchestrator
        .begin_store(StoreRequest::new(audit_report("healthy")));
    let err = flow.reset().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_duplicate_record_id_fails_at_anchor() {
    let h = Harness::new();
    h.orchestrator
        .store(StoreRequest::new(audit_report("first")).with_record_id("aud-1"))
        .await
        .unwrap();

    let mut flow = h
        .orchestrator
        .begin_store(StoreRequest::new(audit_report("second")).with_record_id("aud-1"));
    let err = flow.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LedgerWrite);
    assert_eq!(flow.state(), FlowState::Error(ErrorKind::LedgerWrite));
    assert_eq!(h.ledger.len().await, 1);
}

#[tokio::test]
async fn test_missing_ledger_is_not_configured() {
    let store = Arc::new(RecordingBlobStore::default());
    let orchestrator = ProvenanceOrchestrator::builder()
        .cipher(fast_cipher())
        .store(audit_provenance::store::StoreClient::new(store.clone()))
        .identity(Arc::new(audit_provenance::identity::StaticIdentity::new(OWNER)))
        .build();

    let mut flow = orchestrator.begin_store(StoreRequest::new(audit_report("nowhere")));
    let err = flow.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotConfigured);
    assert_eq!(flow.state(), FlowState::Error(ErrorKind::NotConfigured));
    assert_eq!(store.uploads(), 0);
}

// ============================================================================
// Enumeration
// ============================================================================

#[tokio::test]
async fn test_entries_stream_across_pages() {
    let ledger = Arc::new(MemoryLedger::new());
    let orchestrator = ProvenanceOrchestrator::builder()
        .cipher(fast_cipher())
        .ledger(LedgerClient::new(ledger.clone()).with_page_size(2))
        .identity(Arc::new(audit_provenance::identity::StaticIdentity::new(OWNER)))
        .build();

    for i in 0..5 {
        orchestrator
            .store(StoreRequest::new(json!({"n": i})).with_record_id(format!("aud-{i}")))
            .await
            .unwrap();
    }

    let entries: Vec<_> = orchestrator.entries().try_collect().await.unwrap();
    let ids: Vec<_> = entries.iter().map(|e| e.record_id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["aud-0", "aud-1", "aud-2", "aud-3", "aud-4"]);

    let entry = orchestrator.entry(&RecordId::new("aud-3")).await.unwrap();
    assert_eq!(entry.unwrap().record_id, RecordId::new("aud-3"));
}
