//! # Configuration System
//!
//! Explicit, validated configuration for the registry data-access core.
//! All tunables live in YAML files with environment-specific overlays;
//! malformed configuration is rejected at initialization and never
//! per-request.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use registry_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let cooldown = manager.config().circuit_breaker.cooldown();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::defaults;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring registry-core.yaml
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryCoreConfig {
    /// Tiered cache behavior
    pub cache: CacheSettings,

    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerSettings,

    /// Upstream registry service endpoint
    pub upstream: UpstreamSettings,

    /// Health and consistency monitor cadence
    pub monitor: MonitorSettings,
}

impl Default for RegistryCoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            upstream: UpstreamSettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl RegistryCoreConfig {
    /// Validate loaded values, rejecting degenerate configurations
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.default_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.default_ttl_seconds",
                "must be greater than zero",
            ));
        }
        if self.cache.sweep_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.sweep_interval_seconds",
                "must be greater than zero",
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.failure_threshold",
                "must be greater than zero",
            ));
        }
        if self.circuit_breaker.cooldown_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.cooldown_seconds",
                "must be greater than zero",
            ));
        }
        if self.upstream.base_url.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "upstream.base_url",
                "must not be empty",
            ));
        }
        if self.upstream.fetch_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "upstream.fetch_timeout_seconds",
                "must be greater than zero",
            ));
        }
        if !(0.0..1.0).contains(&self.monitor.drift_tolerance) {
            return Err(ConfigurationError::invalid_value(
                "monitor.drift_tolerance",
                "must be within [0.0, 1.0)",
            ));
        }
        Ok(())
    }
}

/// Tiered cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL applied when a call site does not specify one
    pub default_ttl_seconds: u64,

    /// Interval between background sweeps of expired fallback entries
    pub sweep_interval_seconds: u64,

    /// Shared-tier payloads at or above this size are gzip-compressed
    pub compression_threshold_bytes: usize,

    /// Prefix applied to every shared-tier key
    pub key_prefix: String,

    /// Shared cache backend URL; absent means fallback tier only
    pub redis_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: defaults::CACHE_DEFAULT_TTL.as_secs(),
            sweep_interval_seconds: defaults::CACHE_SWEEP_INTERVAL.as_secs(),
            compression_threshold_bytes: defaults::CACHE_COMPRESSION_THRESHOLD_BYTES,
            key_prefix: "registry:".to_string(),
            redis_url: None,
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before admitting a trial call
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::CIRCUIT_FAILURE_THRESHOLD,
            cooldown_seconds: defaults::CIRCUIT_COOLDOWN.as_secs(),
        }
    }
}

impl CircuitBreakerSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Upstream registry service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Base URL of the upstream registry API
    pub base_url: String,

    /// Per-request timeout applied by the HTTP client
    pub request_timeout_seconds: u64,

    /// Total latency budget for a gateway fetch covering the upstream attempt
    pub fetch_timeout_seconds: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_seconds: 5,
            fetch_timeout_seconds: defaults::FETCH_TIMEOUT.as_secs(),
        }
    }
}

impl UpstreamSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// Health and consistency monitor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Interval between periodic monitor runs
    pub interval_seconds: u64,

    /// Relative drift tolerated on numeric fields before warning becomes fail
    pub drift_tolerance: f64,

    /// Key whose fallback coverage decides unhealthy vs degraded when the
    /// circuit is open; defaults to the first snapshot key when absent
    pub canary_key: Option<String>,

    /// Canonical sample keys diffed by the consistency monitor
    pub sample_keys: Vec<String>,

    /// Filesystem override for the bundled fallback snapshot
    pub fallback_snapshot_path: Option<PathBuf>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_seconds: defaults::MONITOR_INTERVAL.as_secs(),
            drift_tolerance: defaults::CONSISTENCY_DRIFT_TOLERANCE,
            canary_key: None,
            sample_keys: Vec::new(),
            fallback_snapshot_path: None,
        }
    }
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RegistryCoreConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = RegistryCoreConfig::default();
        config.cache.default_ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = RegistryCoreConfig::default();
        config.upstream.base_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_drift_tolerance_bounds() {
        let mut config = RegistryCoreConfig::default();
        config.monitor.drift_tolerance = 1.0;
        assert!(config.validate().is_err());

        config.monitor.drift_tolerance = 0.0;
        assert!(config.validate().is_ok());
    }
}
