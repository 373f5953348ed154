//! The delivery loop: connect, then fetch → serialize → publish → sleep
//!
//! A single control flow owns the transport. The only places it yields to a
//! shutdown request are the two timed waits (reconnect backoff and poll
//! sleep), both of which race the timer against the shutdown watch channel.

use super::state::{DeliveryEvent, DeliveryState, ReconnectPolicy, ReconnectionDecision};
use crate::config::CollectorConfig;
use crate::delivery_span;
use crate::error::CollectorResult;
use crate::source::DataSource;
use crate::transport::{OutboundMessage, QueueTransport};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};

/// Timing for the delivery loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub poll_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self::from(&CollectorConfig::default())
    }
}

impl From<&CollectorConfig> for DeliverySettings {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            poll_interval: config.collector.poll_interval(),
            reconnect: ReconnectPolicy::new(config.collector.reconnect_backoff()),
        }
    }
}

/// Counters kept for the lifetime of one loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub cycles: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub connections_established: u64,
    pub readings_published: u64,
    pub fetch_failures: u64,
    /// Readings lost because the broker dropped mid-publish
    pub readings_dropped: u64,
}

/// Whether the loop should keep going after a wait or handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Interrupted,
}

/// Periodic weather publisher
pub struct DeliveryLoop<S, T> {
    source: S,
    transport: T,
    settings: DeliverySettings,
    shutdown: watch::Receiver<bool>,
    state: DeliveryState,
    stats: DeliveryStats,
}

impl<S, T> DeliveryLoop<S, T>
where
    S: DataSource,
    T: QueueTransport,
{
    /// `shutdown` flips to `true` when the process should stop
    pub fn new(
        source: S,
        transport: T,
        settings: DeliverySettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            transport,
            settings,
            shutdown,
            state: DeliveryState::Disconnected,
            stats: DeliveryStats::default(),
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    /// Run until interrupted or an unrecoverable error occurs
    ///
    /// The transport is closed exactly once on the way out, whichever way
    /// the loop ends.
    pub async fn run(mut self) -> CollectorResult<DeliveryStats> {
        info!(
            source = self.source.name(),
            queue = self.transport.queue_name(),
            poll_interval_secs = self.settings.poll_interval.as_secs_f64(),
            reconnect_backoff_secs = self.settings.reconnect.backoff.as_secs_f64(),
            "Delivery loop starting"
        );

        let outcome = self.drive().await;
        self.apply(if outcome.is_ok() {
            DeliveryEvent::Interrupted
        } else {
            DeliveryEvent::FatalError
        });

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Failed to close broker connection cleanly");
        }

        match outcome {
            Ok(()) => {
                info!(
                    cycles = self.stats.cycles,
                    published = self.stats.readings_published,
                    fetch_failures = self.stats.fetch_failures,
                    dropped = self.stats.readings_dropped,
                    reconnects = self.stats.connections_established.saturating_sub(1),
                    "Delivery loop stopped"
                );
                Ok(self.stats)
            }
            Err(e) => {
                error!(error = %e, "Delivery loop stopped on unrecoverable error");
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> CollectorResult<()> {
        loop {
            match self.state {
                DeliveryState::Disconnected => self.apply(DeliveryEvent::ConnectRequested),
                DeliveryState::Connecting => {
                    if self.establish_connection().await? == Flow::Interrupted {
                        return Ok(());
                    }
                }
                DeliveryState::Connected => {
                    self.stats.cycles += 1;
                    let span = delivery_span!(
                        cycle = self.stats.cycles,
                        queue = %self.transport.queue_name()
                    );
                    self.run_cycle().instrument(span).await?;

                    let poll_interval = self.settings.poll_interval;
                    if self.wait(poll_interval).await == Flow::Interrupted {
                        return Ok(());
                    }
                }
                DeliveryState::Terminating => return Ok(()),
            }
        }
    }

    /// Retry the handshake at a fixed interval until it succeeds
    async fn establish_connection(&mut self) -> CollectorResult<Flow> {
        let mut failed_attempts = 0u32;

        loop {
            let attempt = match self
                .settings
                .reconnect
                .should_attempt(failed_attempts, self.shutdown_requested())
            {
                ReconnectionDecision::Proceed { attempt } => attempt,
                ReconnectionDecision::AbortShutdownRequested => return Ok(Flow::Interrupted),
            };

            self.stats.connect_attempts += 1;
            match self.transport.connect().await {
                Ok(()) => {
                    self.stats.connections_established += 1;
                    self.apply(DeliveryEvent::HandshakeSucceeded);
                    return Ok(Flow::Continue);
                }
                Err(e) if e.is_recoverable() => {
                    failed_attempts = attempt;
                    self.stats.connect_failures += 1;
                    self.apply(DeliveryEvent::HandshakeFailed);

                    let delay = self.settings.reconnect.delay_after(attempt);
                    warn!(
                        attempt,
                        retry_in_secs = delay.as_secs_f64(),
                        error = %e,
                        "Broker unavailable, retrying"
                    );
                    if self.wait(delay).await == Flow::Interrupted {
                        return Ok(Flow::Interrupted);
                    }
                }
                Err(e) => {
                    error!(attempt, error = %e, "Broker connection cannot be retried");
                    return Err(e.into());
                }
            }
        }
    }

    /// One fetch/publish pass; fetch failures and lost connections are absorbed
    async fn run_cycle(&mut self) -> CollectorResult<()> {
        debug_assert!(self.state.can_publish());

        let reading = match self.source.fetch_reading().await {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.fetch_failures += 1;
                error!(source = self.source.name(), error = %e, "Failed to fetch weather data");
                return Ok(());
            }
        };

        let message =
            OutboundMessage::persistent(self.transport.queue_name(), reading.to_payload()?);

        match self.transport.publish(&message).await {
            Ok(()) => {
                self.stats.readings_published += 1;
                info!(
                    message_id = %message.message_id,
                    payload = %message.body_text(),
                    "Published reading"
                );
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                self.stats.readings_dropped += 1;
                warn!(error = %e, "Publish failed, reading dropped");
                self.apply(DeliveryEvent::ConnectionLost);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sleep for `period` unless shutdown is requested first
    async fn wait(&mut self, period: Duration) -> Flow {
        if self.shutdown_requested() {
            return Flow::Interrupted;
        }

        let sleep = tokio::time::sleep(period);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Flow::Continue,
                changed = self.shutdown.changed() => match changed {
                    Ok(()) if *self.shutdown.borrow() => return Flow::Interrupted,
                    Ok(()) => continue,
                    // Sender gone: no interrupt can arrive any more
                    Err(_) => {
                        (&mut sleep).await;
                        return Flow::Continue;
                    }
                },
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn apply(&mut self, event: DeliveryEvent) {
        let next = self.state.next(event);
        if next != self.state {
            DeliveryState::log_transition(self.state, next);
            self.state = next;
        }
    }
}
