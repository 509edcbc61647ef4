//! Building a ready router from configuration.

use tracing::info;
use waypoint_config::WaypointConfig;
use waypoint_router::{Route, Router, RouterResult, WarmSource};

/// Creates a router from `config`, registers `routes` and compiles the table.
///
/// With `router.cache_path` set, the persisted table is reused when it still
/// describes `routes`; otherwise the table is built and written there.
/// Without it the table is built in memory.
///
/// # Errors
///
/// Returns an error if a route cannot be registered or compiled.
///
/// # Example
///
/// ```
/// use waypoint::bootstrap::router_from_config;
/// use waypoint::config::WaypointConfig;
/// use waypoint::router::Route;
///
/// let router = router_from_config(
///     &WaypointConfig::default(),
///     [Route::get("/health", "health")],
/// )
/// .unwrap();
/// assert!(router.is_warm());
/// ```
pub fn router_from_config<I>(config: &WaypointConfig, routes: I) -> RouterResult<Router>
where
    I: IntoIterator<Item = Route>,
{
    let mut router = Router::with_options(config.router.to_router_options());
    for route in routes {
        router.add(route)?;
    }

    match &config.router.cache_path {
        Some(path) => {
            let source = router.warm_from_cache_or_build(path)?;
            info!(
                path = %path.display(),
                routes = router.len(),
                from_cache = source == WarmSource::Cache,
                "Route table ready"
            );
        }
        None => {
            router.warm()?;
            info!(routes = router.len(), "Route table ready");
        }
    }

    Ok(router)
}
