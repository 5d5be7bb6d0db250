//! Record store, lookup and verify handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use futures::TryStreamExt;
use tracing::instrument;

use crate::api::error::ApiError;
use crate::api::types::{ListRecordsResponse, VerifyResponse};
use crate::domain::{LedgerEntry, RecordId, StoreReceipt, StoreRequest};
use crate::infra::ProvenanceError;
use crate::metrics::{metric_names, timed};
use crate::server::AppState;

/// POST /v1/records - Encrypt, store and anchor a record.
#[instrument(skip_all)]
pub async fn store_record(
    State(state): State<AppState>,
    body: Result<Json<StoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StoreReceipt>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::invalid_body(e.body_text()))?;

    let result = timed(
        &state.metrics,
        metric_names::STORE_LATENCY,
        state.orchestrator.store(request),
    )
    .await;

    match result {
        Ok(receipt) => {
            let counter = if receipt.storage.is_skipped() {
                metric_names::RECORDS_STORE_SKIPPED
            } else {
                metric_names::RECORDS_STORED
            };
            state.metrics.inc_counter(counter).await;
            Ok((StatusCode::CREATED, Json(receipt)))
        }
        Err(e) => {
            state.metrics.inc_counter(metric_names::STORE_FAILURES).await;
            Err(e.into())
        }
    }
}

/// GET /v1/records - List every anchored entry.
#[instrument(skip_all)]
pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<ListRecordsResponse>, ApiError> {
    let records: Vec<LedgerEntry> = state
        .orchestrator
        .entries()
        .try_collect()
        .await
        .map_err(ProvenanceError::from)?;

    Ok(Json(ListRecordsResponse {
        count: records.len(),
        records,
    }))
}

/// GET /v1/records/:record_id - Ledger entry for one record.
#[instrument(skip(state))]
pub async fn get_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let record_id = RecordId::new(record_id);
    state
        .orchestrator
        .entry(&record_id)
        .await?
        .map(Json)
        .ok_or_else(|| ProvenanceError::RecordNotFound(record_id).into())
}

/// POST /v1/records/:record_id/verify - Fetch, check and decrypt a record.
#[instrument(skip(state))]
pub async fn verify_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let record_id = RecordId::new(record_id);
    let result = timed(
        &state.metrics,
        metric_names::VERIFY_LATENCY,
        state.orchestrator.verify(&record_id),
    )
    .await;

    match result {
        Ok(verified) => {
            let counter = if verified.is_intact() {
                metric_names::VERIFY_OK
            } else {
                metric_names::VERIFY_TAMPER_WARNINGS
            };
            state.metrics.inc_counter(counter).await;
            Ok(Json(verified.into()))
        }
        Err(e) => {
            let counter = match e {
                ProvenanceError::NotAuthorized { .. } | ProvenanceError::MissingIdentity => {
                    metric_names::VERIFY_REFUSED
                }
                _ => metric_names::VERIFY_FAILURES,
            };
            state.metrics.inc_counter(counter).await;
            Err(e.into())
        }
    }
}
