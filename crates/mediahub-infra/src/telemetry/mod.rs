//! Telemetry initialization
//!
//! Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, TelemetryConfig};
