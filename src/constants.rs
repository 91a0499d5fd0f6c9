//! # System Constants
//!
//! Operational defaults and shared enums that define the boundaries of the
//! registry data-access core. Configuration may override the defaults; the
//! constants here are the values used when no configuration is supplied.

use serde::{Deserialize, Serialize};

/// Default operational parameters for the resilience layer
pub mod defaults {
    use std::time::Duration;

    /// Consecutive upstream failures before the circuit opens
    pub const CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

    /// Cool-down the circuit observes before admitting a trial call
    pub const CIRCUIT_COOLDOWN: Duration = Duration::from_secs(30);

    /// Entry TTL applied when a call site does not specify one
    pub const CACHE_DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// Interval between background sweeps of expired fallback entries
    pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

    /// Shared-tier payloads at or above this size are gzip-compressed
    pub const CACHE_COMPRESSION_THRESHOLD_BYTES: usize = 4096;

    /// Total latency budget for a gateway fetch covering the upstream attempt
    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

    /// Interval between periodic monitor runs (health ping + consistency diff)
    pub const MONITOR_INTERVAL: Duration = Duration::from_secs(120);

    /// Relative drift tolerated on numeric fields before a consistency
    /// check escalates from warning to fail
    pub const CONSISTENCY_DRIFT_TOLERANCE: f64 = 0.20;
}

/// Overall system health classification reported by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Outcome of a single consistency check against the fallback snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warning => "warning",
            CheckStatus::Fail => "fail",
        }
    }
}
