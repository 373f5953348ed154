//! AMQP 0-9-1 transport backed by `lapin`
//!
//! Each successful [`QueueTransport::connect`] opens one connection, one
//! channel on it, and declares the durable queue. A broker that already holds
//! the queue with different durability answers `PRECONDITION_FAILED`; that is
//! reported as [`TransportError::DeclareMismatch`] and never retried.

use super::{OutboundMessage, QueueTransport, TransportError, PERSISTENT_DELIVERY_MODE};
use crate::config::{CollectorConfig, ConfigError};
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::time::Duration;
use tracing::{debug, warn};

const REPLY_SUCCESS: u16 = 200;

/// Open connection plus the channel bound to the declared queue
struct AmqpHandle {
    connection: Connection,
    channel: Channel,
}

/// RabbitMQ transport for the delivery loop
pub struct AmqpTransport {
    uri: String,
    queue: String,
    handshake_timeout: Duration,
    handle: Option<AmqpHandle>,
}

impl AmqpTransport {
    pub fn new(
        uri: impl Into<String>,
        queue: impl Into<String>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            uri: uri.into(),
            queue: queue.into(),
            handshake_timeout,
            handle: None,
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.broker_uri()?,
            config.broker.queue_name.clone(),
            config.collector.request_timeout(),
        ))
    }

    /// Queue declaration flags shared by producer and consumers
    fn declare_options() -> QueueDeclareOptions {
        QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        }
    }

    fn message_properties(message: &OutboundMessage) -> BasicProperties {
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from(message.content_type.clone()))
            .with_message_id(ShortString::from(message.message_id.to_string()));

        if message.persistent {
            properties.with_delivery_mode(PERSISTENT_DELIVERY_MODE)
        } else {
            properties
        }
    }

    /// Handshake, open a channel and declare the queue
    async fn open(&self) -> Result<AmqpHandle, TransportError> {
        let connection = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                Self::close_quietly(&connection, "channel open failed").await;
                return Err(TransportError::ConnectFailed(e.to_string()));
            }
        };

        if let Err(e) = channel
            .queue_declare(&self.queue, Self::declare_options(), FieldTable::default())
            .await
        {
            Self::close_quietly(&connection, "queue declare failed").await;
            return Err(classify_declare_error(&self.queue, e));
        }

        Ok(AmqpHandle {
            connection,
            channel,
        })
    }

    async fn close_quietly(connection: &Connection, reason: &str) {
        if connection.status().connected() {
            if let Err(e) = connection.close(REPLY_SUCCESS, reason).await {
                debug!(error = %e, "Ignoring error while closing broker connection");
            }
        }
    }

    /// Drop a handle the broker no longer honours
    async fn discard_handle(&mut self, reason: &str) {
        if let Some(handle) = self.handle.take() {
            Self::close_quietly(&handle.connection, reason).await;
        }
    }
}

#[async_trait]
impl QueueTransport for AmqpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.discard_handle("reconnecting").await;

        let handle = tokio::time::timeout(self.handshake_timeout, self.open())
            .await
            .map_err(|_| TransportError::Timeout(self.handshake_timeout))??;

        debug!(queue = %self.queue, "Declared durable queue");
        self.handle = Some(handle);
        Ok(())
    }

    async fn publish(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let (channel_open, channel) = match &self.handle {
            Some(handle) => (handle.channel.status().connected(), handle.channel.clone()),
            None => return Err(TransportError::NotConnected),
        };
        if !channel_open {
            self.discard_handle("channel closed").await;
            return Err(TransportError::ConnectionLost(
                "channel closed by broker".to_string(),
            ));
        }

        let result = match channel
            .basic_publish(
                "",
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.payload,
                Self::message_properties(message),
            )
            .await
        {
            Ok(confirm) => confirm.await,
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let error = classify_publish_error(e);
                if matches!(error, TransportError::ConnectionLost(_)) {
                    self.discard_handle("publish failed").await;
                }
                Err(error)
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        if !handle.connection.status().connected() {
            warn!("Broker connection already gone at close");
            return Ok(());
        }

        handle
            .connection
            .close(REPLY_SUCCESS, "collector shutting down")
            .await
            .map_err(|e| TransportError::CloseFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    fn queue_name(&self) -> &str {
        &self.queue
    }
}

/// `PRECONDITION_FAILED` on declare means the queue exists with other flags
fn classify_declare_error(queue: &str, error: lapin::Error) -> TransportError {
    if is_precondition_failed(&error) {
        TransportError::DeclareMismatch {
            queue: queue.to_string(),
            reason: error.to_string(),
        }
    } else {
        TransportError::ConnectFailed(error.to_string())
    }
}

fn is_precondition_failed(error: &lapin::Error) -> bool {
    match error {
        lapin::Error::ProtocolError(amqp_error) => matches!(
            amqp_error.kind(),
            AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED)
        ),
        _ => false,
    }
}

/// Encoding failures stay local; anything else means the link is unusable
fn classify_publish_error(error: lapin::Error) -> TransportError {
    match error {
        lapin::Error::SerialisationError(_) | lapin::Error::ParsingError(_) => {
            TransportError::PublishFailed(error.to_string())
        }
        other => TransportError::ConnectionLost(other.to_string()),
    }
}
