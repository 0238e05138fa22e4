//! Configuration management for Turnstile.
//!
//! Configuration is layered: serde defaults, then an optional YAML file,
//! then `TURNSTILE__`-prefixed environment variables
//! (e.g. `TURNSTILE__SERVER__HTTP_ADDR=0.0.0.0:8080`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::{RouteRules, DEFAULT_CLEANUP_BATCH};

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "TURNSTILE";
/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_request_timeout() -> u64 {
    10
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Path to the route rules file
    pub rules_path: Option<String>,

    /// Rules reload interval in seconds; 0 disables reloading
    #[serde(default = "default_reload_interval")]
    pub rules_reload_interval_secs: u64,

    /// Expired buckets removed per check
    #[serde(default = "default_cleanup_batch")]
    pub cleanup_batch: usize,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            rules_reload_interval_secs: default_reload_interval(),
            cleanup_batch: default_cleanup_batch(),
        }
    }
}

fn default_reload_interval() -> u64 {
    60
}

fn default_cleanup_batch() -> usize {
    DEFAULT_CLEANUP_BATCH
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TurnstileConfig {
    /// Load configuration from an optional YAML file plus environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let path = path.to_str().ok_or_else(|| {
                TurnstileError::Config(format!("config path is not UTF-8: {}", path.display()))
            })?;
            builder = builder.add_source(config::File::new(path, config::FileFormat::Yaml));
        }

        let config: TurnstileConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a YAML string, without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TurnstileError::Config(e.to_string()))
    }

    /// Load the configured route rules, or the default table if none is
    /// configured.
    pub fn load_rules(&self) -> Result<RouteRules> {
        match &self.rate_limiting.rules_path {
            Some(path) => RouteRules::from_file(path),
            None => Ok(RouteRules::default()),
        }
    }
}
