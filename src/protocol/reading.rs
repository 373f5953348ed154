//! Weather reading and its queue payload encoding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type of every published payload
pub const PAYLOAD_CONTENT_TYPE: &str = "application/json";

/// One sample taken from the weather provider
///
/// Immutable once built. `timestamp` is seconds since the Unix epoch, taken
/// from the local clock when the provider response was parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    temperature: f64,
    windspeed: f64,
    latitude: String,
    longitude: String,
    timestamp: f64,
}

/// Payload encoding/decoding errors
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Failed to encode reading: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode reading: {0}")]
    Decode(#[source] serde_json::Error),
}

impl Reading {
    pub fn new(
        temperature: f64,
        windspeed: f64,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        timestamp: f64,
    ) -> Self {
        Self {
            temperature,
            windspeed,
            latitude: latitude.into(),
            longitude: longitude.into(),
            timestamp,
        }
    }

    /// Build a reading stamped with the current wall-clock time
    pub fn observed_now(
        temperature: f64,
        windspeed: f64,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        Self::new(
            temperature,
            windspeed,
            latitude,
            longitude,
            epoch_seconds(Utc::now()),
        )
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn windspeed(&self) -> f64 {
        self.windspeed
    }

    pub fn latitude(&self) -> &str {
        &self.latitude
    }

    pub fn longitude(&self) -> &str {
        &self.longitude
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Encode as the UTF-8 JSON body published to the queue
    pub fn to_payload(&self) -> Result<Vec<u8>, PayloadError> {
        serde_json::to_vec(self).map_err(PayloadError::Encode)
    }

    /// Decode a queue body back into a reading
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(payload).map_err(PayloadError::Decode)
    }
}

/// Seconds since the epoch with microsecond precision
fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
