//! HTTP API handlers for invoice-intake

pub mod health;
pub mod sse;
pub mod upload;

pub use health::health_routes;
pub use sse::{event_stream, upload_event_stream};
pub use upload::upload_routes;
