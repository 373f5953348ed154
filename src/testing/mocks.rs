//! Mock implementations for testing
//!
//! Provides scripted `DataSource` and `QueueTransport` implementations so the
//! delivery loop can be exercised without a network or a broker. Mocks are
//! `Clone` and share their recorders, so a test keeps one clone as a observer
//! while the loop owns the other.

use crate::protocol::{PayloadError, Reading};
use crate::source::{DataSource, FetchError};
use crate::transport::{OutboundMessage, QueueTransport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// How a [`MockDataSource`] answers once its script runs out
#[derive(Debug, Clone)]
enum Fallback {
    /// Reading with `temperature` equal to the call index
    Counting {
        latitude: String,
        longitude: String,
    },
    Fail(FetchError),
}

/// Mock weather source
#[derive(Debug, Clone)]
pub struct MockDataSource {
    script: Arc<Mutex<VecDeque<Result<Reading, FetchError>>>>,
    fallback: Fallback,
    calls: Arc<AtomicUsize>,
}

impl MockDataSource {
    /// Succeeds forever; call `n` (from 0) yields temperature `n`
    pub fn counting(latitude: &str, longitude: &str) -> Self {
        Self {
            script: Arc::default(),
            fallback: Fallback::Counting {
                latitude: latitude.to_string(),
                longitude: longitude.to_string(),
            },
            calls: Arc::default(),
        }
    }

    /// Fails every call with `error`
    pub fn failing(error: FetchError) -> Self {
        Self {
            script: Arc::default(),
            fallback: Fallback::Fail(error),
            calls: Arc::default(),
        }
    }

    /// Plays `outcomes` in order, then keeps counting
    pub fn scripted(outcomes: Vec<Result<Reading, FetchError>>) -> Self {
        let source = Self::counting("0", "0");
        Self {
            script: Arc::new(Mutex::new(outcomes.into())),
            ..source
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_reading(&self) -> Result<Reading, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(outcome) = self.script.lock().await.pop_front() {
            return outcome;
        }

        match &self.fallback {
            Fallback::Counting {
                latitude,
                longitude,
            } => Ok(Reading::observed_now(
                call as f64,
                1.0,
                latitude.as_str(),
                longitude.as_str(),
            )),
            Fallback::Fail(error) => Err(error.clone()),
        }
    }
}

/// Message captured by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub persistent: bool,
    pub content_type: String,
}

impl PublishedMessage {
    pub fn reading(&self) -> Result<Reading, PayloadError> {
        Reading::from_payload(&self.payload)
    }
}

/// Mock broker transport
///
/// `connect` and `publish` pop scripted results first and succeed once the
/// scripts are empty.
#[derive(Debug, Clone)]
pub struct MockTransport {
    queue: String,
    connect_script: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
    publish_script: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    connect_attempts: Arc<Mutex<Vec<Instant>>>,
    close_calls: Arc<AtomicUsize>,
    connected: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_string(),
            connect_script: Arc::default(),
            publish_script: Arc::default(),
            published: Arc::default(),
            connect_attempts: Arc::default(),
            close_calls: Arc::default(),
            connected: Arc::default(),
        }
    }

    /// Fail the next `count` handshakes with a recoverable error
    pub async fn fail_connects(&self, count: usize) {
        let mut script = self.connect_script.lock().await;
        for _ in 0..count {
            script.push_back(Err(TransportError::ConnectFailed(
                "connection refused".to_string(),
            )));
        }
    }

    pub async fn push_connect_result(&self, result: Result<(), TransportError>) {
        self.connect_script.lock().await.push_back(result);
    }

    pub async fn push_publish_result(&self, result: Result<(), TransportError>) {
        self.publish_script.lock().await.push_back(result);
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    /// Clock readings (tokio time) of every handshake attempt
    pub async fn connect_attempts(&self) -> Vec<Instant> {
        self.connect_attempts.lock().await.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueTransport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connect_attempts.lock().await.push(Instant::now());
        self.connected.store(false, Ordering::SeqCst);

        let result = self
            .connect_script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.connected.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn publish(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        if !self.connected() {
            return Err(TransportError::NotConnected);
        }

        if let Some(Err(error)) = self.publish_script.lock().await.pop_front() {
            if error.is_recoverable() {
                self.connected.store(false, Ordering::SeqCst);
            }
            return Err(error);
        }

        self.published.lock().await.push(PublishedMessage {
            routing_key: message.routing_key.clone(),
            payload: message.payload.clone(),
            persistent: message.persistent,
            content_type: message.content_type.clone(),
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected()
    }

    fn queue_name(&self) -> &str {
        &self.queue
    }
}
