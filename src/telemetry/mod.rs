//! Telemetry module
//!
//! Structured logging and Prometheus metrics.

mod logging;
pub mod metrics;

pub use logging::init_logging;

use crate::config::TelemetryConfig;

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level)?;

    if let Some(port) = config.metrics_port {
        metrics::init_exporter(port)?;
    }

    Ok(())
}
