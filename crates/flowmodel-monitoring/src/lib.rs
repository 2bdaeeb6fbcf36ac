//! Monitoring setup for the flowmodel runtime.
//!
//! Holds the logging configuration and the subscriber initialization used by
//! binaries; libraries only emit `tracing` events.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

pub mod logging;
pub use logging::{init_logging, LogExt};

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup event
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Log level filter (e.g., "info,flowmodel_core=debug"); `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub enable_json_logging: bool,
}

fn default_service_name() -> String {
    "flowmodel".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_filter: default_log_filter(),
            enable_json_logging: false,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("FLOWMODEL_SERVICE_NAME") {
            if !name.trim().is_empty() {
                config.service_name = name;
            }
        }

        if let Some(filter) = lookup("FLOWMODEL_LOG_FILTER") {
            if !filter.trim().is_empty() {
                config.log_filter = filter;
            }
        }

        if let Some(json) = lookup("FLOWMODEL_LOG_JSON") {
            match json.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => config.enable_json_logging = true,
                "0" | "false" | "no" => config.enable_json_logging = false,
                _ => warn!("Invalid FLOWMODEL_LOG_JSON value: {}", json),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitoringConfig::from_lookup(|_| None);
        assert_eq!(config, MonitoringConfig::default());
        assert_eq!(config.log_filter, "info");
        assert!(!config.enable_json_logging);
    }

    #[test]
    fn test_env_overrides() {
        let config = MonitoringConfig::from_lookup(|key| match key {
            "FLOWMODEL_SERVICE_NAME" => Some("widgets".to_string()),
            "FLOWMODEL_LOG_FILTER" => Some("debug".to_string()),
            "FLOWMODEL_LOG_JSON" => Some("TRUE".to_string()),
            _ => None,
        });
        assert_eq!(config.service_name, "widgets");
        assert_eq!(config.log_filter, "debug");
        assert!(config.enable_json_logging);
    }

    #[test]
    fn test_invalid_json_flag_keeps_default() {
        let config = MonitoringConfig::from_lookup(|key| {
            (key == "FLOWMODEL_LOG_JSON").then(|| "sometimes".to_string())
        });
        assert!(!config.enable_json_logging);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: MonitoringConfig =
            serde_json::from_str(r#"{"enable_json_logging": true}"#).unwrap();
        assert_eq!(config.service_name, "flowmodel");
        assert!(config.enable_json_logging);
    }
}
