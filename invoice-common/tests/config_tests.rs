//! Config file resolution and loading
//!
//! Tests that touch environment variables are marked `#[serial]` so they do
//! not race each other.

use invoice_common::config::{
    default_config_path, load_toml_config, load_toml_config_or_default, resolve_config_path,
    LoggingConfig,
};
use invoice_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::Path;

const ENV_VAR: &str = "INVOICE_COMMON_TEST_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TestConfig {
    port: u16,
    logging: LoggingConfig,
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    env::set_var(ENV_VAR, "/from/env.toml");
    let path = resolve_config_path(Some(Path::new("/from/cli.toml")), ENV_VAR, "invoice-test");
    env::remove_var(ENV_VAR);

    assert_eq!(path.unwrap(), Path::new("/from/cli.toml"));
}

#[test]
#[serial]
fn test_environment_used_without_cli_argument() {
    env::set_var(ENV_VAR, "/from/env.toml");
    let path = resolve_config_path(None, ENV_VAR, "invoice-test");
    env::remove_var(ENV_VAR);

    assert_eq!(path.unwrap(), Path::new("/from/env.toml"));
}

#[test]
#[serial]
fn test_blank_environment_value_is_ignored() {
    env::set_var(ENV_VAR, "   ");
    let path = resolve_config_path(None, ENV_VAR, "invoice-test-no-such-app");
    env::remove_var(ENV_VAR);

    assert!(path.is_none());
}

#[test]
fn test_default_path_is_per_app() {
    if let Some(path) = default_config_path("invoice-test") {
        assert!(path.ends_with("invoice-test/config.toml"));
    }
}

#[test]
fn test_existing_file_is_loaded() {
    let file = write_config("port = 6000\n[logging]\nlevel = \"debug\"\n");

    let cfg: TestConfig = load_toml_config_or_default(Some(file.path())).unwrap();

    assert_eq!(cfg.port, 6000);
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
fn test_no_path_gives_defaults() {
    let cfg: TestConfig = load_toml_config_or_default(None).unwrap();
    assert_eq!(cfg.port, 0);
    assert_eq!(cfg.logging.level, "info");
}

#[test]
fn test_malformed_file_is_an_error() {
    let file = write_config("port = \"not a number\"\n");

    let result: invoice_common::Result<TestConfig> = load_toml_config_or_default(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_strict_load_requires_file() {
    let result: invoice_common::Result<TestConfig> =
        load_toml_config(Path::new("/nonexistent/invoice-test.toml"));
    assert!(matches!(result, Err(Error::Config(_))));
}
