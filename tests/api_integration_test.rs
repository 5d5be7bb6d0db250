//! REST API integration tests.
//!
//! These tests drive the full router over in-memory backends.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use audit_provenance::identity::{IdentityProvider, StaticIdentity};
use audit_provenance::ledger::{LedgerClient, MemoryLedger};
use audit_provenance::server::{build_router, AppState};
use audit_provenance::store::{BlobStore, StoreClient};
use audit_provenance::ProvenanceOrchestrator;

use common::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn orchestrator_as(
    identity: &str,
    ledger: Arc<MemoryLedger>,
    store: Arc<dyn BlobStore>,
) -> ProvenanceOrchestrator {
    let identity: Arc<dyn IdentityProvider> = Arc::new(StaticIdentity::new(identity));
    ProvenanceOrchestrator::builder()
        .cipher(fast_cipher())
        .store(StoreClient::new(store))
        .ledger(LedgerClient::new(ledger))
        .identity(identity)
        .build()
}

fn create_test_router(orchestrator: ProvenanceOrchestrator) -> axum::Router<()> {
    build_router().unwrap().with_state(AppState::new(orchestrator))
}

async fn send_request(
    app: &axum::Router<()>,
    method: Method,
    uri: &str,
    body: Option<Body>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    let response = app
        .clone()
        .oneshot(builder.body(body.unwrap_or_else(Body::empty)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();

    let json = if bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes) }))
    };

    (status, json)
}

fn json_body(value: serde_json::Value) -> Option<Body> {
    Some(Body::from(serde_json::to_vec(&value).unwrap()))
}

async fn store_report(app: &axum::Router<()>, record_id: &str) -> serde_json::Value {
    let (status, body) = send_request(
        app,
        Method::POST,
        "/v1/records",
        json_body(json!({
            "recordId": record_id,
            "record": audit_report("api"),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "store failed: {body}");
    body
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_reports_components() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);

    let (status, body) = send_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "audit-provenance");
    assert_eq!(body["ledger"]["configured"], true);
    assert_eq!(body["ledger"]["backend"], "memory");
    assert_eq!(body["store"]["backend"], "recording");
    assert_eq!(body["identity"], OWNER);
}

#[tokio::test]
async fn test_health_degraded_without_ledger() {
    let orchestrator = ProvenanceOrchestrator::builder()
        .cipher(fast_cipher())
        .identity(Arc::new(StaticIdentity::new(OWNER)))
        .build();
    let app = create_test_router(orchestrator);

    let (status, body) = send_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["ledger"]["configured"], false);
    assert_eq!(body["store"]["configured"], false);
}

// ============================================================================
// Records
// ============================================================================

#[tokio::test]
async fn test_store_record_returns_receipt() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);

    let body = store_report(&app, "aud-1").await;

    assert_eq!(body["recordId"], "aud-1");
    assert_eq!(body["storage"]["status"], "stored");
    assert_eq!(body["digest"].as_str().unwrap().len(), 66);
    assert_eq!(body["entry"]["creatorIdentity"], OWNER);
    assert_eq!(body["entry"]["timestampSeconds"], T0);
    assert_eq!(h.store.uploads(), 1);
}

#[tokio::test]
async fn test_store_record_generates_id_when_absent() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/v1/records",
        json_body(json!({ "record": {"title": "anonymous"} })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["recordId"].as_str().unwrap().starts_with("audit-"));
}

#[tokio::test]
async fn test_list_and_get_records() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);
    store_report(&app, "aud-1").await;
    store_report(&app, "aud-2").await;

    let (status, body) = send_request(&app, Method::GET, "/v1/records", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["records"][0]["recordId"], "aud-1");
    assert_eq!(body["records"][1]["recordId"], "aud-2");

    let (status, body) = send_request(&app, Method::GET, "/v1/records/aud-2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recordId"], "aud-2");
    assert!(body["storageLink"].as_str().unwrap().starts_with("memory://"));
}

#[tokio::test]
async fn test_get_missing_record_returns_not_found() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);

    let (status, body) = send_request(&app, Method::GET, "/v1/records/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RECORD_NOT_FOUND");
    assert_eq!(body["error"]["resource_id"], "nope");
}

#[tokio::test]
async fn test_duplicate_record_is_rejected() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);
    store_report(&app, "aud-1").await;

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/v1/records",
        json_body(json!({ "recordId": "aud-1", "record": {"again": true} })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_RECORD");
    assert_eq!(h.ledger.len().await, 1);
}

#[tokio::test]
async fn test_invalid_json_body_returns_bad_request() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/v1/records",
        Some(Body::from("{ not json")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST_BODY");
    assert_eq!(h.store.uploads(), 0);
}

#[tokio::test]
async fn test_store_without_ledger_returns_service_unavailable() {
    let store = Arc::new(RecordingBlobStore::default());
    let orchestrator = ProvenanceOrchestrator::builder()
        .cipher(fast_cipher())
        .store(StoreClient::new(store.clone()))
        .identity(Arc::new(StaticIdentity::new(OWNER)))
        .build();
    let app = create_test_router(orchestrator);

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/v1/records",
        json_body(json!({ "record": {"title": "nowhere"} })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "NOT_CONFIGURED");
    assert_eq!(store.uploads(), 0);
}

#[tokio::test]
async fn test_store_without_identity_is_forbidden() {
    let orchestrator = ProvenanceOrchestrator::builder()
        .cipher(fast_cipher())
        .ledger(LedgerClient::new(Arc::new(MemoryLedger::new())))
        .identity(Arc::new(StaticIdentity::none()))
        .build();
    let app = create_test_router(orchestrator);

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/v1/records",
        json_body(json!({ "record": {"title": "nobody"} })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "IDENTITY_REQUIRED");
}

// ============================================================================
// Verify
// ============================================================================

#[tokio::test]
async fn test_verify_returns_record_and_digests() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);
    let receipt = store_report(&app, "aud-1").await;

    let (status, body) =
        send_request(&app, Method::POST, "/v1/records/aud-1/verify", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recordId"], "aud-1");
    assert_eq!(body["record"], audit_report("api"));
    assert!(body["tamperWarning"].is_null());
    assert_eq!(body["expectedDigest"], receipt["digest"]);
    assert_eq!(body["actualDigest"], receipt["digest"]);
}

#[tokio::test]
async fn test_verify_by_non_creator_is_forbidden() {
    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(RecordingBlobStore::default());

    let owner_app = create_test_router(orchestrator_as(OWNER, ledger.clone(), store.clone()));
    store_report(&owner_app, "aud-1").await;

    let other_app = create_test_router(orchestrator_as(OTHER, ledger, store.clone()));
    let (status, body) =
        send_request(&other_app, Method::POST, "/v1/records/aud-1/verify", None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_AUTHORIZED");
    assert_eq!(body["error"]["resource_id"], "aud-1");
    assert_eq!(store.fetches(), 0);
}

#[tokio::test]
async fn test_verify_unstored_record_returns_not_found() {
    let h = Harness::without_store();
    let app = create_test_router(h.orchestrator);

    let (status, body) = send_request(
        &app,
        Method::POST,
        "/v1/records",
        json_body(json!({ "recordId": "aud-1", "record": {"title": "local"} })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["storage"]["status"], "skipped");
    assert_eq!(body["storageLink"], "");

    let (status, body) =
        send_request(&app, Method::POST, "/v1/records/aud-1/verify", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RECORD_NOT_STORED");
}

// ============================================================================
// Metrics and notifications
// ============================================================================

#[tokio::test]
async fn test_metrics_count_store_and_verify_outcomes() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);
    store_report(&app, "aud-1").await;
    send_request(&app, Method::POST, "/v1/records/aud-1/verify", None).await;
    send_request(&app, Method::POST, "/v1/records/missing/verify", None).await;

    let (status, body) = send_request(&app, Method::GET, "/metrics", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counters"]["provenance.records.stored"], 1);
    assert_eq!(body["counters"]["provenance.verify.ok"], 1);
    assert_eq!(body["counters"]["provenance.verify.failures"], 1);
    assert_eq!(
        body["histograms"]["provenance.verify.latency_seconds"]["count"],
        2
    );
}

#[tokio::test]
async fn test_notifications_empty_without_channel() {
    let h = Harness::new();
    let app = create_test_router(h.orchestrator);

    let (status, body) = send_request(&app, Method::GET, "/v1/notifications", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
