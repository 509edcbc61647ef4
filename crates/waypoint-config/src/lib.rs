//! Typed configuration for Waypoint.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! The loaded [`WaypointConfig`] converts into the router's
//! [`RouterOptions`](waypoint_router::RouterOptions) and the telemetry
//! crate's [`LogConfig`](waypoint_telemetry::LogConfig).
//!
//! # Example
//!
//! ```no_run
//! use waypoint_config::ConfigLoader;
//! use waypoint_router::Router;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("waypoint.toml")?
//!     .with_env_prefix("WAYPOINT")
//!     .load()?;
//!
//! waypoint_telemetry::init_logging(&config.logging.to_log_config())?;
//! let router = Router::with_options(config.router.to_router_options());
//! # let _ = router;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [router]
//! chunk_size = 30
//! cache_path = "var/routes.json"
//! default_methods = ["GET", "HEAD"]
//!
//! [router.aliases]
//! sku = "[A-Z]{3}-[0-9]{4}"
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `WAYPOINT__ROUTER__CHUNK_SIZE=50`
//! - `WAYPOINT__ROUTER__CACHE_PATH=/var/cache/routes.json` (empty unsets)
//! - `WAYPOINT__ROUTER__DEFAULT_METHODS=GET,HEAD,OPTIONS`
//! - `WAYPOINT__ROUTER__ALIASES__SKU=[A-Z]{3}-[0-9]{4}`
//! - `WAYPOINT__LOGGING__ENABLED=false`
//! - `WAYPOINT__LOGGING__LEVEL=waypoint_router=debug`
//! - `WAYPOINT__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{WaypointConfig, WaypointConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LogFormat, LoggingSection, RouterSection};

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_router::{MatchRequest, Route, Router};

    #[test]
    fn test_config_drives_router() {
        let toml = r#"
            [router]
            chunk_size = 2
            default_methods = ["GET"]

            [router.aliases]
            sku = "[A-Z]{3}-[0-9]{4}"
        "#;
        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        let mut router = Router::with_options(config.router.to_router_options());
        router.add(Route::new("/products/{sku:sku}", "product")).unwrap();

        assert!(router
            .match_request(&MatchRequest::new("GET", "/products/ABC-1234"))
            .is_ok());
        assert!(router
            .match_request(&MatchRequest::new("HEAD", "/products/ABC-1234"))
            .is_err());
        assert_eq!(router.warm().unwrap().chunk_size(), 2);
    }
}
