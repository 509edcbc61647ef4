//! Observability for Waypoint.
//!
//! - **Logging**: structured JSON or pretty output via `tracing-subscriber`
//! - **Metrics**: Prometheus text rendering of the router's `metrics` records
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               waypoint-router                 │
//! │   tracing::debug!/trace!/warn!   counter!()   │
//! └───────────────┬───────────────────┬──────────┘
//!                 │                   │
//!                 ▼                   ▼
//!        ┌────────────────┐  ┌──────────────────┐
//!        │    Logging     │  │     Metrics      │
//!        │  (fmt layer)   │  │  (Prometheus)    │
//!        └───────┬────────┘  └────────┬─────────┘
//!                ▼                    ▼
//!            stdout            render_metrics()
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use waypoint_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::builder()
//!     .service_name("edge-router")
//!     .build();
//!
//! let telemetry = init_telemetry(&config)?;
//!
//! // ... route requests ...
//!
//! if let Some(metrics) = telemetry.metrics() {
//!     println!("{}", metrics.render());
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, MetricsConfig, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Handles returned by [`init_telemetry`].
#[derive(Debug, Default)]
pub struct Telemetry {
    metrics: Option<MetricsRegistry>,
}

impl Telemetry {
    /// The installed metrics registry, if metrics are enabled.
    #[must_use]
    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }
}

/// Initializes logging and metrics.
///
/// # Errors
///
/// Returns an error if either subsystem fails to initialize, including when
/// a global subscriber or recorder is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<Telemetry> {
    if config.service_name.trim().is_empty() {
        return Err(TelemetryError::InvalidConfig(
            "service name must not be empty".to_string(),
        ));
    }

    init_logging(&config.logging)?;
    let metrics = init_metrics(&config.metrics)?;

    tracing::info!(
        service.name = %config.service_name,
        metrics = metrics.is_some(),
        "Telemetry initialized"
    );

    Ok(Telemetry { metrics })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_service_name_rejected() {
        let config = TelemetryConfig {
            service_name: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_telemetry(&config),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_init_with_everything_disabled() {
        let mut config = TelemetryConfig::builder().without_metrics().build();
        config.logging.enabled = false;

        let telemetry = init_telemetry(&config).unwrap();
        assert!(telemetry.metrics().is_none());
    }
}
