//! Testing utilities and mock implementations
//!
//! Scripted stand-ins for the weather provider and the broker so the delivery
//! loop can be driven on a paused clock.

pub mod mocks;

pub use mocks::*;
