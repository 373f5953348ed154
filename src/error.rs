//! Crate-level error type for the weather collector
//!
//! Fetch and connection errors are normally recovered inside the delivery
//! loop; a `CollectorError` reaching `main` means the process must stop.
//! `main` runs every command as a `CollectorResult<()>`.

use crate::config::ConfigError;
use crate::protocol::PayloadError;
use crate::source::FetchError;
use crate::transport::TransportError;
use thiserror::Error;

/// Main error type for collector operations
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather source error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for collector operations
pub type CollectorResult<T> = Result<T, CollectorError>;
