//! SQLite ledger integration tests.
//!
//! Each test runs against a private in-memory database.

mod common;

use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::json;

use audit_provenance::domain::{Digest, Identity, LedgerEntry, RecordId, StorageLink, StoreRequest};
use audit_provenance::identity::StaticIdentity;
use audit_provenance::infra::FixedClock;
use audit_provenance::ledger::{
    LedgerBackend, LedgerClient, LedgerError, LedgerWriteError, SqliteLedger,
};
use audit_provenance::store::StoreClient;
use audit_provenance::ProvenanceOrchestrator;

use common::*;

fn entry(id: &str, ts: u64) -> LedgerEntry {
    LedgerEntry {
        record_id: RecordId::new(id),
        creator_identity: Identity::new(OWNER),
        timestamp_seconds: ts,
        digest: Digest([ts as u8; 32]),
        storage_link: StorageLink::new(format!("ipfs://{id}")),
    }
}

#[tokio::test]
async fn test_append_then_find() {
    let ledger = SqliteLedger::in_memory().await.unwrap();
    let e = entry("aud-1", T0);

    ledger.append(&e).await.unwrap();

    let found = ledger.find(&RecordId::new("aud-1")).await.unwrap();
    assert_eq!(found, Some(e));
    assert!(ledger.find(&RecordId::new("aud-2")).await.unwrap().is_none());
    assert_eq!(ledger.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_record_id_is_refused() {
    let ledger = SqliteLedger::in_memory().await.unwrap();
    ledger.append(&entry("aud-1", T0)).await.unwrap();

    let err = ledger.append(&entry("aud-1", T0 + 1)).await.unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Write(LedgerWriteError::Duplicate(ref id)) if id.as_str() == "aud-1"
    ));
    let kept = ledger.find(&RecordId::new("aud-1")).await.unwrap().unwrap();
    assert_eq!(kept.timestamp_seconds, T0);
}

#[tokio::test]
async fn test_entries_with_empty_link_round_trip() {
    let ledger = SqliteLedger::in_memory().await.unwrap();
    let mut e = entry("aud-1", T0);
    e.storage_link = StorageLink::empty();

    ledger.append(&e).await.unwrap();

    let found = ledger.find(&RecordId::new("aud-1")).await.unwrap().unwrap();
    assert!(found.storage_link.is_empty());
}

#[tokio::test]
async fn test_fetch_page_keeps_insertion_order() {
    let ledger = SqliteLedger::in_memory().await.unwrap();
    // ids deliberately out of lexical order
    for (i, id) in ["zeta", "alpha", "mid"].iter().enumerate() {
        ledger.append(&entry(id, T0 + i as u64)).await.unwrap();
    }

    let first = ledger.fetch_page(0, 2).await.unwrap();
    let rest = ledger.fetch_page(2, 2).await.unwrap();

    let ids: Vec<_> = first
        .iter()
        .chain(rest.iter())
        .map(|e| e.record_id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    assert!(ledger.fetch_page(3, 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_all_streams_every_page() {
    let ledger = Arc::new(SqliteLedger::in_memory().await.unwrap());
    for i in 0..7 {
        ledger.append(&entry(&format!("aud-{i}"), T0 + i)).await.unwrap();
    }

    let client = LedgerClient::new(ledger).with_page_size(3);
    let entries: Vec<_> = client.list_all().try_collect().await.unwrap();

    assert_eq!(entries.len(), 7);
    assert_eq!(entries[0].record_id.as_str(), "aud-0");
    assert_eq!(entries[6].record_id.as_str(), "aud-6");
}

#[tokio::test]
async fn test_store_and_verify_over_sqlite() {
    let ledger = Arc::new(SqliteLedger::in_memory().await.unwrap());
    let store = Arc::new(RecordingBlobStore::default());
    let orchestrator = ProvenanceOrchestrator::builder()
        .cipher(fast_cipher())
        .store(StoreClient::new(store.clone()))
        .ledger(LedgerClient::new(ledger.clone()))
        .identity(Arc::new(StaticIdentity::new(OWNER)))
        .clock(Arc::new(FixedClock::new(T0)))
        .build();

    let record = json!({"title": "persisted", "findings": []});
    let receipt = orchestrator
        .store(StoreRequest::new(record.clone()).with_record_id("aud-1"))
        .await
        .unwrap();

    let row = ledger.find(&RecordId::new("aud-1")).await.unwrap().unwrap();
    assert_eq!(row.digest, receipt.digest);
    assert_eq!(row.timestamp_seconds, T0);

    let verified = orchestrator.verify(&RecordId::new("aud-1")).await.unwrap();
    assert_eq!(verified.record, record);
    assert!(verified.is_intact());
}
