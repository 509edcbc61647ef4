//! Structured logging for Waypoint.
//!
//! One `tracing-subscriber` fmt layer is installed: JSON lines in
//! production, pretty output with span timings and source locations in
//! development. `RUST_LOG`, when set and non-empty, replaces the configured
//! level.
//!
//! Router and dispatcher events are emitted at `debug` under the
//! `waypoint_router` and `waypoint` targets, so
//! `level = "info,waypoint_router=debug"` shows every match decision.
//!
//! ```rust,ignore
//! use waypoint_telemetry::logging::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::development().with_level("waypoint_router=trace"))?;
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How log events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Installs nothing when false.
    pub enabled: bool,
    /// Filter directives, e.g. `info` or `info,waypoint_router=debug`.
    pub level: String,
    /// JSON lines instead of pretty output.
    pub json_format: bool,
    /// Emit span open/close events with timings.
    pub span_events: bool,
    /// Attach file and line to each event.
    pub source_locations: bool,
    /// Reported once when logging starts.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Pretty output at `debug` with spans and source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            source_locations: true,
            ..Self::production()
        }
    }

    /// JSON output at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            source_locations: false,
            service_name: "waypoint".to_string(),
        }
    }

    /// Sets the filter directives.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    fn directives(&self) -> String {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.trim().is_empty() => directives,
            _ => self.level.clone(),
        }
    }

    fn fmt_layer(&self) -> BoxedLayer {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = tracing_subscriber::fmt::layer()
            .with_span_events(span_events)
            .with_file(self.source_locations)
            .with_line_number(self.source_locations);

        if self.json_format {
            Box::new(layer.json())
        } else {
            Box::new(layer.pretty())
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter does not parse or a
/// global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let directives = config.directives();
    let filter = create_env_filter(&directives)?;

    tracing_subscriber::registry()
        .with(config.fmt_layer().with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(
        service.name = %config.service_name,
        filter = %directives,
        json = config.json_format,
        "Logging initialized"
    );
    Ok(())
}

/// Parses filter directives.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` naming the rejected directives.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level '{filter}': {e}")))
}

/// Logs a successful route match.
///
/// Arguments: method, path, route id, handler reference.
#[macro_export]
macro_rules! log_route_matched {
    ($method:expr, $path:expr, $route_id:expr, $handler:expr) => {
        tracing::debug!(
            http.method = %$method,
            http.path = %$path,
            route.id = $route_id,
            route.handler = %$handler,
            "Route matched"
        );
    };
}

/// Logs a request that no route accepted.
///
/// Arguments: method, path, response status, match error.
#[macro_export]
macro_rules! log_route_rejected {
    ($method:expr, $path:expr, $status:expr, $error:expr) => {
        tracing::debug!(
            http.method = %$method,
            http.path = %$path,
            http.status_code = $status,
            error = %$error,
            "Route not matched"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let production = LogConfig::default();
        assert_eq!(production, LogConfig::production());
        assert!(production.json_format);
        assert!(!production.source_locations);
        assert_eq!(production.level, "info");

        let development = LogConfig::development();
        assert!(!development.json_format);
        assert!(development.span_events);
        assert!(development.source_locations);
        assert_eq!(development.level, "debug");
        assert_eq!(development.service_name, production.service_name);
    }

    #[test]
    fn test_builder_methods() {
        let config = LogConfig::production()
            .with_level("waypoint_router=trace")
            .with_service_name("edge");
        assert_eq!(config.level, "waypoint_router=trace");
        assert_eq!(config.service_name, "edge");
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("info,waypoint_router=debug").is_ok());

        let err = create_env_filter("waypoint=loud").unwrap_err();
        assert!(matches!(err, TelemetryError::LoggingInit(ref msg) if msg.contains("waypoint=loud")));
    }

    #[test]
    fn test_disabled_logging_installs_nothing() {
        let config = LogConfig {
            enabled: false,
            level: "waypoint=loud".to_string(),
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
