//! Configuration for invoice-intake
//!
//! Bootstrap configuration is read from TOML and resolved with priority
//! CLI flag → environment → TOML file → compiled defaults. Everything here is
//! static for the lifetime of the process.

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::models::ExistingRecord;
use crate::services::item_pipeline::StageTiming;
use invoice_common::config::{load_toml_config_or_default, resolve_config_path, LoggingConfig};
use invoice_common::{Error, Result};

/// Application name used for the platform config directory
pub const APP_NAME: &str = "invoice-intake";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "INVOICE_INTAKE_CONFIG";

/// Full-size files one POST /upload/files body may carry
const FILES_PER_REQUEST: usize = 4;

/// Room for JSON keys and file names in an upload body
const REQUEST_OVERHEAD_BYTES: usize = 64 * 1024;

/// Bootstrap configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Interface to bind the HTTP server to
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// EventBus channel capacity
    pub event_capacity: usize,

    /// Largest file the upload surface accepts, in bytes
    pub max_file_bytes: usize,

    /// Prepend the dashboard's sample invoices to the record store
    pub use_sample_records: bool,

    /// Existing invoices to compare new uploads against
    pub records: Vec<ExistingRecord>,

    /// Simulated stage latencies
    pub pipeline: PipelineConfig,

    pub logging: LoggingConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5790,
            event_capacity: 100,
            max_file_bytes: 20 * 1024 * 1024,
            use_sample_records: true,
            records: Vec::new(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Simulated latency of each pipeline stage, in milliseconds
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// uploading → extracting
    pub upload_delay_ms: u64,
    /// extracting → analyzing
    pub extract_delay_ms: u64,
    /// analyzing → complete
    pub analyze_delay_ms: u64,
    /// last item settled → summary view
    pub settle_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_delay_ms: 800,
            extract_delay_ms: 1000,
            analyze_delay_ms: 800,
            settle_delay_ms: 500,
        }
    }
}

impl PipelineConfig {
    pub fn stage_timing(&self) -> StageTiming {
        StageTiming {
            upload: Duration::from_millis(self.upload_delay_ms),
            extract: Duration::from_millis(self.extract_delay_ms),
            analyze: Duration::from_millis(self.analyze_delay_ms),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl IntakeConfig {
    /// Resolve and load the config file, falling back to defaults
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR, APP_NAME);
        let config: IntakeConfig = load_toml_config_or_default(path.as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line / environment overrides on top of the file
    pub fn with_overrides(mut self, port: Option<u16>, bind_address: Option<String>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(bind_address) = bind_address {
            self.bind_address = bind_address;
        }
        self
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        self.bind_address.parse::<IpAddr>().map_err(|e| {
            Error::Config(format!("Invalid bind_address '{}': {}", self.bind_address, e))
        })?;

        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }

        if self.max_file_bytes == 0 {
            return Err(Error::Config("max_file_bytes must be at least 1".to_string()));
        }

        if let Some(record) = self.records.iter().find(|r| r.id.trim().is_empty()) {
            return Err(Error::Config(format!(
                "Existing record with vendor '{}' has an empty id",
                record.vendor
            )));
        }

        Ok(())
    }

    /// Largest POST /upload/files body the router buffers
    ///
    /// Sized from `max_file_bytes` after base64 expansion, so a file just over
    /// the limit still reaches screening and is reported as too large.
    pub fn request_body_limit(&self) -> usize {
        let encoded = self.max_file_bytes.div_ceil(3).saturating_mul(4);
        encoded
            .saturating_mul(FILES_PER_REQUEST)
            .saturating_add(REQUEST_OVERHEAD_BYTES)
    }

    /// Socket address the server listens on
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind_address.parse().map_err(|e| {
            Error::Config(format!("Invalid bind_address '{}': {}", self.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// `EnvFilter` directive used when `RUST_LOG` is not set
    ///
    /// A bare level ("debug") is scoped to this crate and tower_http; anything
    /// else is passed through as a full directive.
    pub fn log_directive(&self) -> String {
        let level = self.logging.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("invoice_intake={level},invoice_common={level},tower_http={level}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timings() {
        let config = IntakeConfig::default();
        let timing = config.pipeline.stage_timing();
        assert_eq!(timing.upload, Duration::from_millis(800));
        assert_eq!(timing.extract, Duration::from_millis(1000));
        assert_eq!(timing.analyze, Duration::from_millis(800));
        assert_eq!(config.pipeline.settle_delay(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_pipeline_section_keeps_other_defaults() {
        let config: IntakeConfig = toml::from_str("[pipeline]\nextract_delay_ms = 5\n").unwrap();
        assert_eq!(config.pipeline.extract_delay_ms, 5);
        assert_eq!(config.pipeline.upload_delay_ms, 800);
        assert_eq!(config.port, 5790);
    }

    #[test]
    fn test_log_directive_scopes_bare_level() {
        let mut config = IntakeConfig::default();
        config.logging.level = "debug".to_string();
        assert!(config.log_directive().starts_with("invoice_intake=debug"));

        config.logging.level = "warn,invoice_intake=trace".to_string();
        assert_eq!(config.log_directive(), "warn,invoice_intake=trace");
    }

    #[test]
    fn test_request_body_limit_covers_encoded_file() {
        let config = IntakeConfig {
            max_file_bytes: 3_000_000,
            ..IntakeConfig::default()
        };
        // 3 MB of raw bytes is 4 MB once base64 encoded
        assert!(config.request_body_limit() > 4_000_000 * FILES_PER_REQUEST);

        let config = IntakeConfig {
            max_file_bytes: usize::MAX,
            ..IntakeConfig::default()
        };
        assert_eq!(config.request_body_limit(), usize::MAX);
    }

    #[test]
    fn test_validate_rejects_bad_bind_address() {
        let config = IntakeConfig {
            bind_address: "not-an-ip".to_string(),
            ..IntakeConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
