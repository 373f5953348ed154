//! Observability for the weather collector
//!
//! Structured logging only; there are no metrics or health endpoints.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::delivery_span;
