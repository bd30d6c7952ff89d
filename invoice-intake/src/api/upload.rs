//! Upload surface API handlers
//!
//! POST/GET/DELETE /upload/session, POST /upload/files, POST /upload/duplicate,
//! POST /upload/reset, GET /upload/summary

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{BatchError, BatchSnapshot, BatchSummary, DuplicateDecision, ItemId, PhaseKind};
use crate::services::upload_surface::{screen, IncomingFile};
use crate::AppState;

/// One file in a POST /upload/files request
#[derive(Debug, Deserialize)]
pub struct UploadFile {
    pub name: String,
    /// File content, standard base64
    pub content_base64: String,
}

/// POST /upload/files request
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub files: Vec<UploadFile>,
}

/// File turned away by the upload surface
#[derive(Debug, Serialize)]
pub struct RejectedFile {
    pub file_name: String,
    pub reason: String,
}

/// POST /upload/files response
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub batch_id: Uuid,
    pub accepted: Vec<ItemId>,
    pub rejected: Vec<RejectedFile>,
    pub phase: PhaseKind,
}

/// POST /upload/duplicate request
#[derive(Debug, Deserialize)]
pub struct ResolveDuplicateRequest {
    pub decision: DuplicateDecision,
}

/// POST /upload/duplicate response
#[derive(Debug, Serialize)]
pub struct ResolveDuplicateResponse {
    pub item_id: ItemId,
    pub decision: DuplicateDecision,
    pub phase: PhaseKind,
}

/// POST /upload/reset response
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub batch_id: Uuid,
    pub items_dropped: usize,
    pub phase: PhaseKind,
}

/// DELETE /upload/session response
#[derive(Debug, Serialize)]
pub struct CloseSessionResponse {
    pub batch_id: Uuid,
    pub closed_at: DateTime<Utc>,
}

/// POST /upload/session
///
/// Open the upload surface with a fresh, empty batch. A surface that is
/// already open is closed first.
pub async fn open_session(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<BatchSnapshot>)> {
    let controller = state.open_surface().await;
    Ok((StatusCode::CREATED, Json(controller.snapshot().await)))
}

/// GET /upload/session
pub async fn get_session(State(state): State<AppState>) -> ApiResult<Json<BatchSnapshot>> {
    let controller = state.current_batch().await?;
    Ok(Json(controller.snapshot().await))
}

/// DELETE /upload/session
pub async fn close_session(
    State(state): State<AppState>,
) -> ApiResult<Json<CloseSessionResponse>> {
    let batch_id = state
        .close_surface()
        .await
        .ok_or_else(|| ApiError::NotFound("No upload session is open".to_string()))?;

    Ok(Json(CloseSessionResponse {
        batch_id,
        closed_at: Utc::now(),
    }))
}

/// POST /upload/files
///
/// Screen the files and enqueue the accepted ones. Rejections are reported in
/// the response; the request only fails if the batch refuses new files.
pub async fn enqueue_files(
    State(state): State<AppState>,
    request: Result<Json<EnqueueRequest>, JsonRejection>,
) -> ApiResult<Json<EnqueueResponse>> {
    let Json(request) = request?;
    let controller = state.current_batch().await?;

    let mut incoming = Vec::with_capacity(request.files.len());
    for file in request.files {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(file.content_base64.as_bytes())
            .map_err(|e| ApiError::BadRequest(format!("{}: invalid base64 content: {}", file.name, e)))?;
        incoming.push(IncomingFile::new(file.name, bytes));
    }

    let screened = screen(incoming, state.config.max_file_bytes);
    let accepted = recorded(&state, controller.enqueue(screened.accepted).await).await?;

    tracing::info!(
        batch_id = %controller.batch_id(),
        accepted = accepted.len(),
        rejected = screened.rejected.len(),
        "Upload request processed"
    );

    Ok(Json(EnqueueResponse {
        batch_id: controller.batch_id(),
        accepted,
        rejected: screened
            .rejected
            .into_iter()
            .map(|e| RejectedFile {
                file_name: e.file_name().to_string(),
                reason: e.to_string(),
            })
            .collect(),
        phase: controller.snapshot().await.phase,
    }))
}

/// POST /upload/duplicate
pub async fn resolve_duplicate(
    State(state): State<AppState>,
    request: Result<Json<ResolveDuplicateRequest>, JsonRejection>,
) -> ApiResult<Json<ResolveDuplicateResponse>> {
    let Json(request) = request?;
    let controller = state.current_batch().await?;
    let item_id = recorded(&state, controller.resolve_duplicate(request.decision).await).await?;

    Ok(Json(ResolveDuplicateResponse {
        item_id,
        decision: request.decision,
        phase: controller.snapshot().await.phase,
    }))
}

/// POST /upload/reset
///
/// "Upload more": drop every item and show the drop zone again.
pub async fn reset_batch(State(state): State<AppState>) -> ApiResult<Json<ResetResponse>> {
    let controller = state.current_batch().await?;
    let items_dropped = recorded(&state, controller.reset().await).await?;

    Ok(Json(ResetResponse {
        batch_id: controller.batch_id(),
        items_dropped,
        phase: PhaseKind::Upload,
    }))
}

/// GET /upload/summary
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<BatchSummary>> {
    let controller = state.current_batch().await?;
    Ok(Json(controller.summary().await?))
}

/// Keep a refused intent for `/health` diagnostics
async fn recorded<T>(state: &AppState, result: Result<T, BatchError>) -> ApiResult<T> {
    if let Err(e) = &result {
        tracing::warn!(error = %e, "Upload intent refused");
        state.record_error(e.to_string()).await;
    }
    Ok(result?)
}

/// Build upload routes
///
/// `body_limit` replaces axum's 2 MB default for request bodies.
pub fn upload_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload/session",
            post(open_session).get(get_session).delete(close_session),
        )
        .route("/upload/files", post(enqueue_files))
        .route("/upload/duplicate", post(resolve_duplicate))
        .route("/upload/reset", post(reset_batch))
        .route("/upload/summary", get(get_summary))
        .layer(DefaultBodyLimit::max(body_limit))
}
