//! REST API routes.

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers::{
    get_record, health_check, list_notifications, list_records, metrics_snapshot, store_record,
    verify_record,
};
use crate::server::AppState;

/// Build the service router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_snapshot))
        .route("/v1/records", post(store_record).get(list_records))
        .route("/v1/records/:record_id", get(get_record))
        .route("/v1/records/:record_id/verify", post(verify_record))
        .route("/v1/notifications", get(list_notifications))
}
