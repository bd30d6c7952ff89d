//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git hash captured at build time
    pub git_hash: String,
    pub build_timestamp: String,
    pub uptime_seconds: u64,
    /// Batch of the open upload surface, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_batch: Option<Uuid>,
    /// Number of existing records duplicate detection compares against
    pub existing_records: usize,
    /// Connected SSE clients
    pub event_subscribers: usize,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let open_batch = state
        .surface
        .read()
        .await
        .as_ref()
        .map(|controller| controller.batch_id());
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "invoice-intake".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        uptime_seconds,
        open_batch,
        existing_records: state.records.len(),
        event_subscribers: state.event_bus.subscriber_count(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
