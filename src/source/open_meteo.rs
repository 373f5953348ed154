//! Open-Meteo forecast provider
//!
//! Issues `GET {base_url}/forecast?latitude=..&longitude=..&current_weather=true`
//! and extracts `current_weather.temperature` and `current_weather.windspeed`.
//! The API needs no key.

use super::{DataSource, FetchError};
use crate::config::CollectorConfig;
use crate::protocol::Reading;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Open-Meteo provider configuration
#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    pub base_url: String,
    pub latitude: String,
    pub longitude: String,
    pub timeout: Duration,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        let config = CollectorConfig::default();
        Self::from(&config)
    }
}

impl From<&CollectorConfig> for OpenMeteoConfig {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            base_url: config.source.base_url.clone(),
            latitude: config.location.latitude.clone(),
            longitude: config.location.longitude.clone(),
            timeout: config.collector.request_timeout(),
        }
    }
}

/// Open-Meteo `DataSource` implementation
pub struct OpenMeteoSource {
    config: OpenMeteoConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
}

impl OpenMeteoSource {
    pub fn new(config: OpenMeteoConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::NotConfigured(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self, FetchError> {
        Self::new(OpenMeteoConfig::from(config))
    }

    /// Forecast endpoint URL without the query string
    pub fn endpoint(&self) -> String {
        format!("{}/forecast", self.config.base_url.trim_end_matches('/'))
    }

    /// Turn a response body into a reading stamped now (pure apart from the clock)
    fn parse_forecast(
        body: &[u8],
        latitude: &str,
        longitude: &str,
    ) -> Result<Reading, FetchError> {
        let forecast: ForecastResponse =
            serde_json::from_slice(body).map_err(|e| FetchError::MalformedBody(e.to_string()))?;

        Ok(Reading::observed_now(
            forecast.current_weather.temperature,
            forecast.current_weather.windspeed,
            latitude,
            longitude,
        ))
    }
}

#[async_trait]
impl DataSource for OpenMeteoSource {
    fn name(&self) -> &str {
        "open-meteo"
    }

    async fn fetch_reading(&self) -> Result<Reading, FetchError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("latitude", self.config.latitude.as_str()),
                ("longitude", self.config.longitude.as_str()),
                ("current_weather", "true"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        debug!(bytes = body.len(), "Received forecast response");

        Self::parse_forecast(&body, &self.config.latitude, &self.config.longitude)
    }
}
