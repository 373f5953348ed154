//! Broker transport layer
//!
//! This module provides the transport abstraction the delivery loop drives
//! and its AMQP implementation. A transport owns at most one live broker
//! handle at a time: `connect` replaces any stale handle, `close` releases
//! it and is a no-op when nothing is open.

use crate::protocol::PAYLOAD_CONTENT_TYPE;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod amqp;

pub use amqp::AmqpTransport;

/// AMQP delivery mode asking the broker to write the message to disk
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Broker transport errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
    #[error("Broker handshake timed out after {0:?}")]
    Timeout(Duration),
    #[error("Queue '{queue}' exists with incompatible settings: {reason}")]
    DeclareMismatch { queue: String, reason: String },
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Publishing failed: {0}")]
    PublishFailed(String),
    #[error("Closing connection failed: {0}")]
    CloseFailed(String),
}

impl TransportError {
    /// Whether reconnecting can clear this error
    ///
    /// `DeclareMismatch` needs an operator to fix the queue definition, and a
    /// `PublishFailed` means the message itself was rejected locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectFailed(_)
                | TransportError::Timeout(_)
                | TransportError::ConnectionLost(_)
                | TransportError::NotConnected
                | TransportError::CloseFailed(_)
        )
    }
}

/// One message ready for the broker
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub message_id: Uuid,
    /// Routing key on the default exchange, i.e. the queue name
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub content_type: String,
    pub persistent: bool,
}

impl OutboundMessage {
    /// Durable-delivery JSON message routed straight to `queue`
    pub fn persistent(queue: &str, payload: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            routing_key: queue.to_string(),
            payload,
            content_type: PAYLOAD_CONTENT_TYPE.to_string(),
            persistent: true,
        }
    }

    /// Payload as text for logging
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Transport trait for the delivery loop
///
/// Implementations are driven from a single control flow, so methods take
/// `&mut self` and no internal locking is needed.
#[async_trait]
pub trait QueueTransport: Send {
    /// Open the broker connection and declare the durable queue
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Publish one message through the default exchange
    async fn publish(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Release the broker handle, if any
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if a handle is currently held
    fn is_connected(&self) -> bool;

    /// Queue this transport declares and routes to
    fn queue_name(&self) -> &str;
}
