//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading: file layering over
//! defaults, validation failures, and error reporting for unreadable files.

use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use weather_collector::config::{CollectorConfig, ConfigError};

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[broker]
host = "broker.local"
port = 5673
user = "collector"
password = "hunter2"
queue_name = "weather_data"

[location]
latitude = "52.52"
longitude = "13.41"

[source]
base_url = "http://localhost:8080/v1"

[collector]
poll_interval_secs = 30
reconnect_backoff_secs = 5
request_timeout_secs = 4
"#,
    );

    let config = CollectorConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker.port, 5673);
    assert_eq!(config.broker.queue_name, "weather_data");
    assert_eq!(config.source.base_url, "http://localhost:8080/v1");
    assert_eq!(config.collector.poll_interval(), Duration::from_secs(30));
    assert_eq!(config.collector.request_timeout(), Duration::from_secs(4));
}

#[test]
fn test_empty_file_yields_defaults() {
    let temp_file = write_config("");

    let config = CollectorConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker.queue_name, "weather_data");
    assert_eq!(config.collector.poll_interval(), Duration::from_secs(10));
    assert_eq!(config.collector.reconnect_backoff(), Duration::from_secs(5));
    assert_eq!(config.source.base_url, "https://api.open-meteo.com/v1");
}

#[test]
fn test_missing_file_is_read_error() {
    let result = CollectorConfig::load_from_file(Path::new("/nonexistent/collector.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let temp_file = write_config("[broker\nhost = ");

    let result = CollectorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_wrong_value_type_is_parse_error() {
    let temp_file = write_config(
        r#"
[broker]
port = "not-a-number"
"#,
    );

    let result = CollectorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_zero_poll_interval_fails_validation() {
    let temp_file = write_config(
        r#"
[collector]
poll_interval_secs = 0
"#,
    );

    let result = CollectorConfig::load_from_file(temp_file.path());
    match result {
        Err(ConfigError::InvalidConfig(message)) => {
            assert!(message.contains("poll_interval_secs"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn test_show_output_masks_password() {
    let temp_file = write_config(
        r#"
[broker]
password = "do-not-print"
"#,
    );

    let config = CollectorConfig::load_from_file(temp_file.path()).unwrap();
    let shown = config.to_redacted_toml().unwrap();

    assert!(!shown.contains("do-not-print"));
    assert!(shown.contains("***"));
}
