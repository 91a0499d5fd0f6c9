//! Health classification
//!
//! Recomputed on each poll from current in-memory state; never
//! persisted. Degradation rules: an open breaker with no fallback
//! coverage for the canary key is unhealthy; an open breaker with
//! coverage, or an unreachable shared cache tier, is degraded.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::TieredCacheStore;
use crate::client::RegistryClient;
use crate::config::MonitorSettings;
use crate::constants::HealthStatus;
use crate::gateway::FallbackSnapshot;
use crate::logging::log_monitor_operation;
use crate::resilience::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};

/// Cache-tier portion of a health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub upstream_cache_reachable: bool,
    pub fallback_entry_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
}

/// Point-in-time health report consumers may poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub cache: CacheHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_reachable: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

/// Computes health reports from breaker and cache state
pub struct HealthMonitor {
    cache: Arc<TieredCacheStore>,
    breaker: Arc<CircuitBreaker>,
    fallback: Arc<FallbackSnapshot>,
    client: Option<Arc<RegistryClient>>,
    canary_key: String,
    latest: RwLock<Option<HealthReport>>,
}

impl HealthMonitor {
    pub fn new(
        cache: Arc<TieredCacheStore>,
        breaker: Arc<CircuitBreaker>,
        fallback: Arc<FallbackSnapshot>,
        client: Option<Arc<RegistryClient>>,
        settings: &MonitorSettings,
    ) -> Self {
        let canary_key = settings
            .canary_key
            .clone()
            .or_else(|| fallback.first_key().map(str::to_string))
            .unwrap_or_default();

        Self {
            cache,
            breaker,
            fallback,
            client,
            canary_key,
            latest: RwLock::new(None),
        }
    }

    /// Compute a fresh health report from current in-memory state
    pub async fn health_check(&self) -> HealthReport {
        let circuit_breaker = self.breaker.snapshot().await;
        let shared_reachable = self.cache.shared_reachable().await;
        let stats = self.cache.stats();

        let upstream_reachable = match &self.client {
            Some(client) => Some(client.ping().await.is_ok()),
            None => None,
        };

        let breaker_open = matches!(circuit_breaker.state, CircuitState::Open);
        let status = if breaker_open && !self.fallback.contains(&self.canary_key) {
            HealthStatus::Unhealthy
        } else if breaker_open || !shared_reachable {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let report = HealthReport {
            status,
            circuit_breaker,
            cache: CacheHealth {
                upstream_cache_reachable: shared_reachable,
                fallback_entry_count: stats.fallback_entries,
                hit_rate: stats.hit_rate(),
            },
            upstream_reachable,
            timestamp: Utc::now(),
        };

        *self.latest.write() = Some(report.clone());
        report
    }

    /// Most recent report, if any poll has run
    pub fn latest(&self) -> Option<HealthReport> {
        self.latest.read().clone()
    }

    pub fn canary_key(&self) -> &str {
        &self.canary_key
    }

    /// Spawn the periodic health poll
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = monitor.health_check().await;
                log_monitor_operation(
                    "health_check",
                    report.status.as_str(),
                    None,
                    None,
                    None,
                );
            }
        })
    }
}
