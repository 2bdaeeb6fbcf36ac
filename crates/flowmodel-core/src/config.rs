//! Engine configuration
//!
//! Values come from defaults overridden by `FLOWMODEL_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::CoreError;

/// What happens to an apply-flow cache entry once its execution settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Drop the entry as soon as it settles; the next request re-executes
    OnSettle,
    /// Keep the settled outcome for a while; requests in that window reuse it
    Retain,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::OnSettle
    }
}

impl FromStr for EvictionPolicy {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "on_settle" => Ok(EvictionPolicy::OnSettle),
            "retain" => Ok(EvictionPolicy::Retain),
            other => Err(CoreError::ConfigurationError(format!(
                "unknown eviction policy '{}', expected on_settle or retain",
                other
            ))),
        }
    }
}

fn parse_retain_ms(value: &str) -> Result<u64, CoreError> {
    value.trim().parse::<u64>().map_err(|e| {
        CoreError::ConfigurationError(format!("invalid retain window '{}': {}", value, e))
    })
}

/// Apply-flow cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Eviction policy for settled entries
    #[serde(default)]
    pub eviction: EvictionPolicy,

    /// Retention window in milliseconds, used by [`EvictionPolicy::Retain`]
    #[serde(default = "default_retain_ms")]
    pub retain_ms: u64,
}

fn default_retain_ms() -> u64 {
    30_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionPolicy::default(),
            retain_ms: default_retain_ms(),
        }
    }
}

impl CacheConfig {
    /// Retention window as a duration
    pub fn retain_for(&self) -> Duration {
        Duration::from_millis(self.retain_ms)
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Apply-flow cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

impl EngineConfig {
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

        if let Some(policy) = lookup("FLOWMODEL_CACHE_EVICTION") {
            match policy.parse::<EvictionPolicy>() {
                Ok(eviction) => config.cache.eviction = eviction,
                Err(e) => warn!(
                    error = %e,
                    "Invalid FLOWMODEL_CACHE_EVICTION, using default on_settle"
                ),
            }
        }

        if let Some(retain_ms) = lookup("FLOWMODEL_CACHE_RETAIN_MS") {
            match parse_retain_ms(&retain_ms) {
                Ok(ms) => config.cache.retain_ms = ms,
                Err(e) => warn!(
                    error = %e,
                    "Invalid FLOWMODEL_CACHE_RETAIN_MS, keeping default"
                ),
            }
        }

        config
    }
}
