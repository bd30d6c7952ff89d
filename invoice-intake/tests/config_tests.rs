//! IntakeConfig loading, overrides and validation

use invoice_intake::config::{IntakeConfig, CONFIG_ENV_VAR};
use invoice_intake::services::RecordStore;
use serial_test::serial;
use std::env;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_full_config_file() {
    let file = write_config(
        r#"
bind_address = "0.0.0.0"
port = 6100
event_capacity = 16
use_sample_records = false

[pipeline]
upload_delay_ms = 10
extract_delay_ms = 20
analyze_delay_ms = 30
settle_delay_ms = 5

[logging]
level = "debug"

[[records]]
id = "ACME-7"
vendor = "Acme Corp"
amount = 99.5

[[records]]
id = "GLOBEX-1"
vendor = "Globex"
"#,
    );

    let config = IntakeConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.port, 6100);
    assert_eq!(config.event_capacity, 16);
    assert_eq!(config.pipeline.extract_delay_ms, 20);
    assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:6100");

    let store = RecordStore::from_config(&config);
    assert_eq!(store.len(), 2);
    assert_eq!(store.find_by_id("ACME-7").unwrap().amount, Some(99.5));
    assert!(store.find_by_id("GLOBEX-1").unwrap().category.is_none());
}

#[test]
#[serial]
fn test_config_from_environment_variable() {
    let file = write_config("port = 6200\n");

    env::set_var(CONFIG_ENV_VAR, file.path());
    let config = IntakeConfig::load(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().port, 6200);
}

#[test]
#[serial]
fn test_missing_explicit_file_uses_defaults() {
    let config = IntakeConfig::load(Some(std::path::Path::new("/nonexistent/intake.toml"))).unwrap();
    assert_eq!(config.port, 5790);
    assert_eq!(config.bind_address, "127.0.0.1");
    assert!(config.use_sample_records);
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    let file = write_config("event_capacity = 0\n");
    assert!(IntakeConfig::load(Some(file.path())).is_err());

    let file = write_config("[[records]]\nid = \"\"\nvendor = \"Nobody\"\n");
    assert!(IntakeConfig::load(Some(file.path())).is_err());
}

#[test]
fn test_overrides_apply_on_top_of_file() {
    let config = IntakeConfig::default().with_overrides(Some(7000), Some("::1".to_string()));
    assert!(config.validate().is_ok());
    assert_eq!(config.socket_addr().unwrap().port(), 7000);

    let untouched = IntakeConfig::default().with_overrides(None, None);
    assert_eq!(untouched.port, 5790);
}
