//! Weather data source abstraction
//!
//! The delivery loop only sees the [`DataSource`] trait, so the HTTP provider
//! can be swapped for a scripted mock in tests.

use crate::protocol::Reading;
use async_trait::async_trait;
use thiserror::Error;

pub mod open_meteo;

pub use open_meteo::OpenMeteoSource;

/// Reasons a single fetch produced no reading
///
/// Every variant is recoverable: the caller logs it and waits for the next
/// cycle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("Request to weather provider failed: {0}")]
    Request(String),
    #[error("Weather provider returned HTTP {0}")]
    Status(u16),
    #[error("Weather provider response is malformed: {0}")]
    MalformedBody(String),
    #[error("Weather source not configured: {0}")]
    NotConfigured(String),
}

/// Something that can produce one [`Reading`] per call
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short provider name used in log fields
    fn name(&self) -> &str;

    /// Fetch the current conditions, never retrying internally
    async fn fetch_reading(&self) -> Result<Reading, FetchError>;
}
