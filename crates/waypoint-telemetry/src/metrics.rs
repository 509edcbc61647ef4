//! Prometheus metrics for Waypoint.
//!
//! The router records through the `metrics` facade. This module installs a
//! Prometheus recorder for those records and renders them in text format.
//! No HTTP listener is started; embedders expose [`render_metrics`] however
//! they like.
//!
//! # Router Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `waypoint_route_matches_total` | Counter | `outcome` | Match attempts by outcome |
//! | `waypoint_route_table_builds_total` | Counter | - | Route table compilations |
//! | `waypoint_route_table_build_seconds` | Histogram | - | Compilation time |
//! | `waypoint_static_routes` | Gauge | - | Routes in the static index |
//! | `waypoint_dynamic_routes` | Gauge | - | Routes in dynamic buckets |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names emitted by `waypoint-router`.
pub mod names {
    /// Match attempts, labelled by `outcome`.
    pub const ROUTE_MATCHES: &str = "waypoint_route_matches_total";

    /// Route table compilations.
    pub const TABLE_BUILDS: &str = "waypoint_route_table_builds_total";

    /// Route table compilation time.
    pub const TABLE_BUILD_SECONDS: &str = "waypoint_route_table_build_seconds";

    /// Routes in the static index of the current table.
    pub const STATIC_ROUTES: &str = "waypoint_static_routes";

    /// Routes in the dynamic buckets of the current table.
    pub const DYNAMIC_ROUTES: &str = "waypoint_dynamic_routes";
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Histogram buckets for table build time, in seconds.
    pub build_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 100us .. 5s
            build_buckets: vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
        }
    }
}

/// Handle onto an installed Prometheus recorder.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with the given handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder and describes the router metrics.
///
/// Returns `None` when metrics are disabled.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the buckets are invalid or a
/// global recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::TABLE_BUILD_SECONDS.to_string()),
            &config.build_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle.clone());
    register_metric_descriptions();

    Ok(Some(MetricsRegistry::new(handle)))
}

/// Returns the global metrics handle if initialized.
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        names::ROUTE_MATCHES,
        "Route match attempts by outcome"
    );
    describe_counter!(names::TABLE_BUILDS, "Route table compilations");
    describe_histogram!(
        names::TABLE_BUILD_SECONDS,
        Unit::Seconds,
        "Time spent compiling the route table"
    );
    describe_gauge!(
        names::STATIC_ROUTES,
        "Routes served from the static index"
    );
    describe_gauge!(
        names::DYNAMIC_ROUTES,
        "Routes served from dynamic buckets"
    );
}
