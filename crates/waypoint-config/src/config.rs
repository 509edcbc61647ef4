//! Main configuration types.
//!
//! This module provides the top-level [`WaypointConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use waypoint_router::ALL_METHODS;
use waypoint_telemetry::logging::create_env_filter;

use crate::{ConfigError, LogFormat, LoggingSection, RouterSection};

/// Complete Waypoint configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use waypoint_config::WaypointConfig;
///
/// let config = WaypointConfig::default();
/// assert_eq!(config.router.chunk_size, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WaypointConfig {
    /// Router configuration.
    #[serde(default)]
    pub router: RouterSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl WaypointConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> WaypointConfigBuilder {
        WaypointConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The chunk size is zero
    /// - No default methods are configured, or one is not an HTTP method
    /// - An alias name is not a word identifier or starts with a digit
    /// - An alias regex is empty
    /// - The log level is not a valid filter directive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.chunk_size == 0 {
            return Err(ConfigError::invalid_value(
                "router.chunk_size",
                "must be at least 1",
            ));
        }

        if self.router.default_methods.is_empty() {
            return Err(ConfigError::invalid_value(
                "router.default_methods",
                "must not be empty",
            ));
        }
        for method in &self.router.default_methods {
            let upper = method.to_ascii_uppercase();
            if !ALL_METHODS.contains(&upper.as_str()) {
                return Err(ConfigError::invalid_value(
                    "router.default_methods",
                    format!("unknown HTTP method '{method}'"),
                ));
            }
        }

        for (name, regex) in &self.router.aliases {
            let field = format!("router.aliases.{name}");
            if !is_alias_name(name) {
                return Err(ConfigError::invalid_value(
                    field,
                    "alias names must be word characters and must not start with a digit",
                ));
            }
            if regex.trim().is_empty() {
                return Err(ConfigError::invalid_value(field, "regex must not be empty"));
            }
        }

        if self.logging.enabled {
            create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty, debug-level logs.
    ///
    /// # Example
    ///
    /// ```
    /// use waypoint_config::{LogFormat, WaypointConfig};
    ///
    /// let config = WaypointConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON, info-level logs.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}

fn is_alias_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Builder for [`WaypointConfig`].
#[derive(Debug, Default)]
pub struct WaypointConfigBuilder {
    router: Option<RouterSection>,
    logging: Option<LoggingSection>,
}

impl WaypointConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the router configuration.
    #[must_use]
    pub fn router(mut self, router: RouterSection) -> Self {
        self.router = Some(router);
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> WaypointConfig {
        WaypointConfig {
            router: self.router.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<WaypointConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
