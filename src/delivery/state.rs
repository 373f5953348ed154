//! Pure connection state machine for the delivery loop
//!
//! Transitions and retry decisions are plain functions so they can be tested
//! without a broker or a clock.

use std::time::Duration;
use tracing::{debug, info, warn};

/// Broker connection state as seen by the delivery loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// No handle held; the next step is a connection attempt
    Disconnected,
    /// Handshake and queue declare in progress, retrying on failure
    Connecting,
    /// Handle established, publish cycles run
    Connected,
    /// Interrupt received or fatal error; the handle is being released
    Terminating,
}

/// Inputs that move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// Process start or the loop noticed it holds no handle
    ConnectRequested,
    HandshakeSucceeded,
    HandshakeFailed,
    ConnectionLost,
    Interrupted,
    FatalError,
}

impl DeliveryState {
    /// Determine next state after an event (pure function)
    ///
    /// Events that make no sense in the current state leave it unchanged.
    pub fn next(self, event: DeliveryEvent) -> DeliveryState {
        use DeliveryEvent as E;
        use DeliveryState as S;

        match (self, event) {
            (S::Terminating, _) => S::Terminating,
            (_, E::Interrupted) | (_, E::FatalError) => S::Terminating,
            (S::Disconnected, E::ConnectRequested) => S::Connecting,
            (S::Connecting, E::HandshakeSucceeded) => S::Connected,
            (S::Connecting, E::HandshakeFailed) => S::Connecting,
            (S::Connected, E::ConnectionLost) => S::Disconnected,
            (state, _) => state,
        }
    }

    /// Check if the state allows publishing (pure function)
    pub fn can_publish(self) -> bool {
        matches!(self, DeliveryState::Connected)
    }

    /// Log a state transition
    pub fn log_transition(from: DeliveryState, to: DeliveryState) {
        match (from, to) {
            (DeliveryState::Connecting, DeliveryState::Connected) => {
                info!("Broker connection established");
            }
            (DeliveryState::Connected, DeliveryState::Disconnected) => {
                warn!("Broker connection lost, will reconnect");
            }
            (_, DeliveryState::Terminating) => {
                info!(from = ?from, "Delivery loop terminating");
            }
            _ => {
                debug!(from = ?from, to = ?to, "Delivery state transition");
            }
        }
    }
}

/// Outcome of asking whether another handshake may start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectionDecision {
    Proceed { attempt: u32 },
    AbortShutdownRequested,
}

/// Fixed-backoff reconnection policy with no attempt limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(crate::config::DEFAULT_RECONNECT_BACKOFF_SECS),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    /// Determine if another attempt should start (pure function)
    ///
    /// Only a shutdown request stops the retries.
    pub fn should_attempt(
        &self,
        failed_attempts: u32,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }
        ReconnectionDecision::Proceed {
            attempt: failed_attempts.saturating_add(1),
        }
    }

    /// Delay inserted after a failed attempt; constant for every attempt
    pub fn delay_after(&self, _attempt: u32) -> Duration {
        self.backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_path_reaches_connected() {
        let state = DeliveryState::Disconnected
            .next(DeliveryEvent::ConnectRequested)
            .next(DeliveryEvent::HandshakeFailed)
            .next(DeliveryEvent::HandshakeFailed)
            .next(DeliveryEvent::HandshakeSucceeded);
        assert_eq!(state, DeliveryState::Connected);
    }

    #[test]
    fn test_failed_handshake_stays_connecting() {
        assert_eq!(
            DeliveryState::Connecting.next(DeliveryEvent::HandshakeFailed),
            DeliveryState::Connecting
        );
    }

    #[test]
    fn test_lost_connection_goes_back_to_disconnected() {
        let state = DeliveryState::Connected.next(DeliveryEvent::ConnectionLost);
        assert_eq!(state, DeliveryState::Disconnected);
        assert_eq!(
            state.next(DeliveryEvent::ConnectRequested),
            DeliveryState::Connecting
        );
    }

    #[test]
    fn test_interrupt_terminates_from_any_state() {
        for state in [
            DeliveryState::Disconnected,
            DeliveryState::Connecting,
            DeliveryState::Connected,
        ] {
            assert_eq!(
                state.next(DeliveryEvent::Interrupted),
                DeliveryState::Terminating
            );
        }
    }

    #[test]
    fn test_terminating_is_absorbing() {
        for event in [
            DeliveryEvent::ConnectRequested,
            DeliveryEvent::HandshakeSucceeded,
            DeliveryEvent::ConnectionLost,
        ] {
            assert_eq!(
                DeliveryState::Terminating.next(event),
                DeliveryState::Terminating
            );
        }
    }

    #[test]
    fn test_irrelevant_events_are_ignored() {
        assert_eq!(
            DeliveryState::Connected.next(DeliveryEvent::HandshakeFailed),
            DeliveryState::Connected
        );
        assert_eq!(
            DeliveryState::Disconnected.next(DeliveryEvent::ConnectionLost),
            DeliveryState::Disconnected
        );
    }

    #[test]
    fn test_only_connected_can_publish() {
        assert!(DeliveryState::Connected.can_publish());
        assert!(!DeliveryState::Connecting.can_publish());
        assert!(!DeliveryState::Disconnected.can_publish());
        assert!(!DeliveryState::Terminating.can_publish());
    }

    #[test]
    fn test_policy_retries_without_limit() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff, Duration::from_secs(5));

        for failed in [0, 1, 10, 10_000, u32::MAX - 1] {
            assert_eq!(
                policy.should_attempt(failed, false),
                ReconnectionDecision::Proceed {
                    attempt: failed + 1
                }
            );
        }
        assert_eq!(
            policy.should_attempt(u32::MAX, false),
            ReconnectionDecision::Proceed { attempt: u32::MAX }
        );
    }

    #[test]
    fn test_policy_aborts_on_shutdown() {
        let policy = ReconnectPolicy::default();
        assert_eq!(
            policy.should_attempt(3, true),
            ReconnectionDecision::AbortShutdownRequested
        );
    }

    #[test]
    fn test_backoff_is_fixed() {
        let policy = ReconnectPolicy::new(Duration::from_millis(250));
        assert_eq!(policy.delay_after(1), Duration::from_millis(250));
        assert_eq!(policy.delay_after(100), Duration::from_millis(250));
    }
}
