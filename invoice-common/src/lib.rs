//! # Invoice Intake Common Library
//!
//! Shared code for the invoice intake service and its tooling:
//! - Event types (`IntakeEvent`) and the broadcast `EventBus`
//! - Item status / batch phase vocabulary shared by producers and consumers
//! - TOML configuration loading and config file resolution
//! - Server-Sent Events helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
