//! Delivery loop and its broker connection state machine
//!
//! - [`state`] - pure state transitions and the reconnection policy
//! - [`runner`] - the loop that drives a [`DataSource`](crate::source::DataSource)
//!   and a [`QueueTransport`](crate::transport::QueueTransport)
//! - [`shutdown`] - SIGINT/SIGTERM to the loop's shutdown channel

pub mod runner;
pub mod shutdown;
pub mod state;

pub use runner::{DeliveryLoop, DeliverySettings, DeliveryStats};
pub use shutdown::install_signal_handlers;
pub use state::{DeliveryEvent, DeliveryState, ReconnectPolicy, ReconnectionDecision};
