//! Tests for logging configuration and format parsing
//!
//! Tests the pure functions in the logging module that handle
//! log format, level and verbosity parsing.

use tracing::Level;
use weather_collector::observability::logging::{apply_verbosity, parse_level, LogFormat};

#[test]
fn test_log_format_parse_json() {
    assert!(matches!(LogFormat::parse("json"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("JSON"), LogFormat::Json));
}

#[test]
fn test_log_format_parse_pretty() {
    assert!(matches!(LogFormat::parse("pretty"), LogFormat::Pretty));
    assert!(matches!(LogFormat::parse("Pretty"), LogFormat::Pretty));
}

#[test]
fn test_log_format_parse_compact() {
    assert!(matches!(LogFormat::parse("compact"), LogFormat::Compact));
    assert!(matches!(LogFormat::parse("COMPACT"), LogFormat::Compact));
}

#[test]
fn test_log_format_parse_invalid_defaults_to_json() {
    // Unknown formats fall back to machine-readable output
    for input in ["invalid", "", "xml", "yaml", "123"] {
        assert!(matches!(LogFormat::parse(input), LogFormat::Json));
    }
}

#[test]
fn test_log_level_from_env_value() {
    assert_eq!(parse_level("warn"), Level::WARN);
    assert_eq!(parse_level("DEBUG"), Level::DEBUG);
    assert_eq!(parse_level("verbose"), Level::INFO);
}

#[test]
fn test_verbose_flag_combines_with_env_level() {
    assert_eq!(apply_verbosity(parse_level("ERROR"), 1), Level::DEBUG);
    assert_eq!(apply_verbosity(parse_level("INFO"), 3), Level::TRACE);
    assert_eq!(apply_verbosity(parse_level("DEBUG"), 0), Level::DEBUG);
}
