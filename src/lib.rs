//! Weather collector
//!
//! Polls the Open-Meteo forecast API on a fixed interval and publishes each
//! reading as a persistent JSON message to a durable RabbitMQ queue. The
//! broker connection is kept alive by a small state machine that retries
//! forever with a fixed backoff and shuts down cleanly on interrupt.
//!
//! # Quick Start
//!
//! ```rust
//! use weather_collector::protocol::Reading;
//!
//! let reading = Reading::new(21.5, 8.2, "-23.5505", "-46.6333", 1_700_000_000.0);
//! let payload = reading.to_payload().unwrap();
//!
//! // Consumers read the same five keys back
//! let decoded = Reading::from_payload(&payload).unwrap();
//! assert_eq!(decoded, reading);
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod source;
pub mod testing;
pub mod transport;

pub use config::{CollectorConfig, ConfigError};
pub use delivery::{DeliveryLoop, DeliverySettings, DeliveryState, DeliveryStats};
pub use error::{CollectorError, CollectorResult};
pub use protocol::*;
pub use source::{DataSource, FetchError, OpenMeteoSource};
pub use transport::{AmqpTransport, OutboundMessage, QueueTransport, TransportError};
