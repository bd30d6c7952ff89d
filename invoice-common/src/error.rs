//! Common error types for invoice intake

use thiserror::Error;

/// Common result type for intake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the intake crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
