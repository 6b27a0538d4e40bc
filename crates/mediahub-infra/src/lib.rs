//! MediaHub Infrastructure Library
//!
//! Shared infrastructure for MediaHub binaries:
//! - Telemetry initialization (tracing subscriber)
//! - Caller-facing error reports

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};

pub use error::ErrorResponse;
