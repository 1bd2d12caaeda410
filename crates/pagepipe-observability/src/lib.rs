//! Observability for request-scoped pages.
//!
//! This crate provides:
//! - `StructuredLogger` - Structured logging with request context
//! - `LogBuilder` - Fluent construction of log entries

mod logging;

pub use logging::*;

// Re-export RequestId from pagepipe-core for convenience
pub use pagepipe_core::RequestId;
