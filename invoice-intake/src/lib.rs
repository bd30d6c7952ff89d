//! invoice-intake library interface
//!
//! Exposes the batch workflow, the HTTP router and the application state for
//! the binary and for integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::IntakeConfig;
use crate::services::{BatchController, ItemPipeline, RecordStore};
use invoice_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IntakeConfig>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Existing invoices duplicate detection compares against
    pub records: RecordStore,
    pub pipeline: ItemPipeline,
    /// Controller of the open upload surface; `None` while closed
    pub surface: Arc<RwLock<Option<BatchController>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: IntakeConfig, event_bus: EventBus) -> Self {
        let records = RecordStore::from_config(&config);
        let pipeline = ItemPipeline::new(config.pipeline.stage_timing());

        Self {
            config: Arc::new(config),
            event_bus,
            records,
            pipeline,
            surface: Arc::new(RwLock::new(None)),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Open the upload surface with a fresh batch
    ///
    /// Closes the previously open batch, if any.
    pub async fn open_surface(&self) -> BatchController {
        let controller = BatchController::new(
            self.pipeline.clone(),
            self.records.clone(),
            self.event_bus.clone(),
            self.config.pipeline.settle_delay(),
        );

        let previous = self.surface.write().await.replace(controller.clone());
        if let Some(previous) = previous {
            previous.close().await;
        }

        controller
    }

    /// Close the upload surface
    ///
    /// Returns the id of the closed batch, or `None` if nothing was open.
    pub async fn close_surface(&self) -> Option<Uuid> {
        let controller = self.surface.write().await.take()?;
        controller.close().await;
        Some(controller.batch_id())
    }

    /// Controller of the open upload surface
    pub async fn current_batch(&self) -> ApiResult<BatchController> {
        self.surface
            .read()
            .await
            .clone()
            .ok_or_else(|| ApiError::NotFound("No upload session is open".to_string()))
    }

    /// Remember an error for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::upload_routes(state.config.request_body_limit()))
        .route("/events", get(api::event_stream))
        .route("/upload/events", get(api::upload_event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
