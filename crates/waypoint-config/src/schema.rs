//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use waypoint_router::{PlaceholderAliases, RouterOptions, DEFAULT_CHUNK_SIZE, DEFAULT_METHODS};
use waypoint_telemetry::LogConfig;

/// Router configuration section.
///
/// # Example
///
/// ```
/// use waypoint_config::RouterSection;
///
/// let section = RouterSection::default();
/// assert_eq!(section.chunk_size, 30);
/// assert_eq!(section.default_methods, ["GET", "HEAD"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouterSection {
    /// Maximum number of dynamic routes per regex set.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Where the compiled route table is persisted, if anywhere.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Methods given to routes that declare none.
    #[serde(default = "default_methods")]
    pub default_methods: Vec<String>,

    /// Placeholder aliases added to, or overriding, the built-in set.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cache_path: None,
            default_methods: default_methods(),
            aliases: BTreeMap::new(),
        }
    }
}

impl RouterSection {
    /// Converts this section into router options.
    #[must_use]
    pub fn to_router_options(&self) -> RouterOptions {
        let mut aliases = PlaceholderAliases::new();
        aliases.extend(
            self.aliases
                .iter()
                .map(|(name, regex)| (name.clone(), regex.clone())),
        );

        RouterOptions::default()
            .with_chunk_size(self.chunk_size)
            .with_aliases(aliases)
            .with_default_methods(self.default_methods.iter().cloned())
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_methods() -> Vec<String> {
    DEFAULT_METHODS.iter().map(|m| (*m).to_string()).collect()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingSection {
    /// Converts this section into a logging configuration.
    ///
    /// Pretty output also turns on span events and source locations.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        let base = match self.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };

        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            ..base
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
