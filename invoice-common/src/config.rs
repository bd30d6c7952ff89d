//! Configuration file resolution and TOML loading
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/<app>/config.toml`)
//!
//! A missing config file is not an error: callers get compiled defaults and a
//! warning in the log.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level or full `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which config file to read
///
/// Returns `None` when neither an explicit path nor the platform default
/// exists; the caller then runs on compiled defaults.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path(app_name).filter(|p| p.exists())
}

/// Platform config file path for `app_name`
///
/// `~/.config/<app>/config.toml` on Linux, the equivalent application config
/// directory elsewhere.
pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(app_name).join("config.toml"))
}

/// Parse a TOML config file
///
/// Explicitly requested files must exist and parse; see
/// [`load_toml_config_or_default`] for the lenient variant.
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file if there is one, otherwise return defaults
///
/// A path that was resolved but does not exist is reported as a warning.
/// A file that exists but fails to parse is still an error: running on
/// defaults would silently ignore what the operator wrote.
pub fn load_toml_config_or_default<T: DeserializeOwned + Default>(
    path: Option<&Path>,
) -> Result<T> {
    match path {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(path)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            Ok(T::default())
        }
        None => {
            info!("No config file found, using compiled defaults");
            Ok(T::default())
        }
    }
}
