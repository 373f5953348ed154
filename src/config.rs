//! Configuration system for the weather collector
//!
//! The configuration is assembled exactly once at startup and passed by
//! reference into the data source and the delivery loop. Values are layered,
//! lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`-c/--config`)
//! 3. Environment variables (`RABBITMQ_*`, `LOCATION_*`)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Queue every reading is published to
pub const DEFAULT_QUEUE_NAME: &str = "weather_data";

/// Seconds between two fetch/publish cycles
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Seconds between two failed broker handshakes
pub const DEFAULT_RECONNECT_BACKOFF_SECS: u64 = 5;

pub const ENV_BROKER_HOST: &str = "RABBITMQ_HOST";
pub const ENV_BROKER_PORT: &str = "RABBITMQ_PORT";
pub const ENV_BROKER_USER: &str = "RABBITMQ_USER";
pub const ENV_BROKER_PASSWORD: &str = "RABBITMQ_PASSWORD";
pub const ENV_LATITUDE: &str = "LOCATION_LAT";
pub const ENV_LONGITUDE: &str = "LOCATION_LON";

const REDACTED: &str = "***";

/// Complete collector configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CollectorConfig {
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub location: LocationSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub collector: CollectorSection,
}

/// AMQP broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerSection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Durable queue readings are routed to through the default exchange
    pub queue_name: String,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            host: "rabbitmq".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
        }
    }
}

/// Coordinates passed through to the weather provider unvalidated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocationSection {
    pub latitude: String,
    pub longitude: String,
}

impl Default for LocationSection {
    fn default() -> Self {
        Self {
            latitude: "-23.5505".to_string(),
            longitude: "-46.6333".to_string(),
        }
    }
}

/// Weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSection {
    /// Base URL of the Open-Meteo API, without the `/forecast` suffix
    pub base_url: String,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1".to_string(),
        }
    }
}

/// Delivery loop timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorSection {
    pub poll_interval_secs: u64,
    pub reconnect_backoff_secs: u64,
    /// Upper bound for one HTTP request or one broker handshake
    pub request_timeout_secs: u64,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            reconnect_backoff_secs: DEFAULT_RECONNECT_BACKOFF_SECS,
            request_timeout_secs: 10,
        }
    }
}

impl CollectorSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    TomlRender(#[from] toml::ser::Error),
    #[error("Invalid value for environment variable {name}: {value:?}")]
    InvalidEnvVar { name: String, value: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CollectorConfig {
    /// Load configuration from an optional TOML file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::parse_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file with environment overrides applied
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Overlay environment values onto the configuration
    ///
    /// `lookup` abstracts `std::env::var` so tests never touch the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_BROKER_HOST) {
            self.broker.host = host;
        }
        if let Some(port) = lookup(ENV_BROKER_PORT) {
            self.broker.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar {
                    name: ENV_BROKER_PORT.to_string(),
                    value: port.clone(),
                })?;
        }
        if let Some(user) = lookup(ENV_BROKER_USER) {
            self.broker.user = user;
        }
        if let Some(password) = lookup(ENV_BROKER_PASSWORD) {
            self.broker.password = password;
        }
        if let Some(latitude) = lookup(ENV_LATITUDE) {
            self.location.latitude = latitude;
        }
        if let Some(longitude) = lookup(ENV_LONGITUDE) {
            self.location.longitude = longitude;
        }
        Ok(())
    }

    /// Reject values the delivery loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "broker host must not be empty".to_string(),
            ));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker port must be non-zero".to_string(),
            ));
        }
        if self.broker.queue_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "queue name must not be empty".to_string(),
            ));
        }
        if self.collector.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.collector.reconnect_backoff_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect_backoff_secs must be at least 1".to_string(),
            ));
        }
        if self.collector.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Url::parse(&self.source.base_url).map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "source base_url '{}' is not a valid URL: {e}",
                self.source.base_url
            ))
        })?;
        Ok(())
    }

    /// Build the `amqp://` URI for the configured broker
    ///
    /// Credentials are percent-encoded, the default vhost is used.
    pub fn broker_uri(&self) -> Result<String, ConfigError> {
        let invalid = || {
            ConfigError::InvalidConfig(format!(
                "cannot build broker URI for host '{}'",
                self.broker.host
            ))
        };

        let mut url = Url::parse(&format!("amqp://{}:{}", self.broker.host, self.broker.port))
            .map_err(|_| invalid())?;
        url.set_username(&self.broker.user).map_err(|_| invalid())?;
        url.set_password(Some(&self.broker.password)).map_err(|_| invalid())?;

        Ok(url.to_string())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.broker.password = REDACTED.to_string();
        copy
    }

    /// Effective configuration as TOML with secrets masked
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }
}
