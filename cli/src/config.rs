//! CLI configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{bail, Result};
use std::path::PathBuf;

/// Name of the metrics log inside the log directory.
pub const METRICS_LOG_FILE: &str = "metrics.log";

/// CLI configuration.
///
/// Configuration values can be set via environment variables:
/// - `PULSEWATCH_LOG_DIR`: Directory holding the metrics log (default: "logs")
/// - `PULSEWATCH_SERVICE`: Service name used as the exposition suffix (default: "monitor")
/// - `DEBUG`: Enables debug-level tracing when `true` or `1` (default: false)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the metrics log.
    pub log_dir: PathBuf,
    /// Service name used as the exposition suffix.
    pub service: String,
    /// Whether debug-level tracing is enabled.
    pub debug: bool,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DEBUG` is set to something other than `true`, `false`, `1`, `0` or empty
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let log_dir = var("PULSEWATCH_LOG_DIR").map_or(defaults.log_dir, PathBuf::from);
        let service = var("PULSEWATCH_SERVICE").unwrap_or(defaults.service);
        let debug = var("DEBUG")
            .map(|v| parse_flag("DEBUG", &v))
            .transpose()?
            .unwrap_or(defaults.debug);

        Ok(Self {
            log_dir,
            service,
            debug,
        })
    }

    /// Applies command-line overrides on top of the environment values.
    #[must_use]
    pub fn with_overrides(mut self, log_dir: Option<PathBuf>, service: Option<String>) -> Self {
        if let Some(log_dir) = log_dir {
            self.log_dir = log_dir;
        }
        if let Some(service) = service {
            self.service = service;
        }
        self
    }

    /// Path of the metrics log file.
    #[must_use]
    pub fn metrics_log_path(&self) -> PathBuf {
        self.log_dir.join(METRICS_LOG_FILE)
    }

    /// Tracing filter used when `RUST_LOG` is not set.
    #[must_use]
    pub fn default_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            service: "monitor".to_string(),
            debug: false,
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => bail!("{name} must be true or false, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.service, "monitor");
        assert!(!config.debug);
    }

    #[test]
    fn test_config_from_empty_vars_uses_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_from_vars() {
        let config = Config::from_vars(vars(&[
            ("PULSEWATCH_LOG_DIR", "/var/log/shop"),
            ("PULSEWATCH_SERVICE", "order-service"),
            ("DEBUG", "true"),
        ]))
        .unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/var/log/shop"));
        assert_eq!(config.service, "order-service");
        assert!(config.debug);
        assert_eq!(config.default_filter(), "debug");
    }

    #[test]
    fn test_config_invalid_debug_flag() {
        let result = Config::from_vars(vars(&[("DEBUG", "sometimes")]));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DEBUG"));
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::default()
            .with_overrides(Some(PathBuf::from("/tmp/pw")), None)
            .with_overrides(None, Some("api".to_string()));

        assert_eq!(config.log_dir, PathBuf::from("/tmp/pw"));
        assert_eq!(config.service, "api");
    }

    #[test]
    fn test_config_metrics_log_path() {
        let config = Config::default();
        assert_eq!(config.metrics_log_path(), PathBuf::from("logs/metrics.log"));
        assert_eq!(config.default_filter(), "info");
    }
}
