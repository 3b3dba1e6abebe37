//! Configuration management for Routestat
//!
//! Parses TOML configuration files and provides typed access to settings.

use crate::error::{AppError, AppResult};
use crate::metrics::route::MetricNamer;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Request metrics configuration
///
/// With `enabled = false` no registry is created and requests pass through
/// the metrics middleware untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Host identifier prefixed to every metric name
    #[serde(default = "default_namespace")]
    namespace: String,
}

impl MetricsConfig {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Metric namer for this host
    pub fn namer(&self) -> MetricNamer {
        MetricNamer::new(&self.namespace)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "routestat".to_string()
}

/// Server span configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TracingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Service name reported with every span
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "routestat".to_string()
}

fn default_true() -> bool {
    true
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks:
    /// - `server.port` is non-zero
    /// - `metrics.namespace` is non-empty, starts with an ASCII letter and
    ///   contains only letters, digits, `_` and `-`
    /// - `tracing.service_name` is non-empty
    /// - `observability.log_level` is a known level
    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(
                "server.port must be non-zero".to_string(),
            ));
        }
        self.socket_addr()?;

        let namespace = self.metrics.namespace();
        if namespace.is_empty() {
            return Err(AppError::Config(
                "metrics.namespace must not be empty".to_string(),
            ));
        }
        if !namespace.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(AppError::Config(format!(
                "metrics.namespace '{}' must start with an ASCII letter",
                namespace
            )));
        }
        if let Some(bad) = namespace
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(AppError::Config(format!(
                "metrics.namespace '{}' contains invalid character '{}'",
                namespace, bad
            )));
        }

        if self.tracing.service_name.trim().is_empty() {
            return Err(AppError::Config(
                "tracing.service_name must not be empty".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.observability.log_level.as_str()) {
            return Err(AppError::Config(format!(
                "observability.log_level '{}' must be one of: {}",
                self.observability.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Address the listener binds to
    ///
    /// # Errors
    ///
    /// Fails when `server.host` is not an IP address. Host names are not
    /// resolved.
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip = self.server.host.parse::<IpAddr>().map_err(|_| {
            AppError::Config(format!(
                "server.host '{}' must be an IPv4 or IPv6 address",
                self.server.host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
