//! Health, metrics and notification handlers.

use axum::extract::State;
use axum::Json;

use crate::api::types::HealthResponse;
use crate::notifications::Notification;
use crate::server::AppState;

/// GET /health - Liveness with component readiness.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::current(&state.orchestrator))
}

/// GET /metrics - Metrics snapshot.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.metrics.to_json().await)
}

/// GET /v1/notifications - Buffered notification history.
pub async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    match &state.notifications {
        Some(channel) => Json(channel.history().await),
        None => Json(Vec::new()),
    }
}
