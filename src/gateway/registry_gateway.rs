//! Gateway façade orchestrating cache, breaker, and fallback
//!
//! One `RegistryGateway` instance is constructed per process (or per
//! logical upstream dependency) and handed to consumers explicitly, so
//! tests can build isolated instances with fake backends and paused
//! clocks.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{distributed::select_backend, TieredCacheStore};
use crate::client::RegistryClient;
use crate::config::RegistryCoreConfig;
use crate::error::{RegistryError, Result};
use crate::gateway::fallback::FallbackSnapshot;
use crate::gateway::keys;
use crate::gateway::response::RegistryResponse;
use crate::logging::{log_error, log_gateway_operation};
use crate::resilience::{CircuitBreaker, CircuitBreakerError};

/// Façade over the resilience layer. Never throws to the caller; all
/// failure is expressed through the `RegistryResponse` shape.
pub struct RegistryGateway {
    cache: Arc<TieredCacheStore>,
    breaker: Arc<CircuitBreaker>,
    fallback: Arc<FallbackSnapshot>,
    client: Arc<RegistryClient>,
    fetch_timeout: Duration,
    default_ttl: Duration,
}

impl RegistryGateway {
    pub fn new(
        cache: Arc<TieredCacheStore>,
        breaker: Arc<CircuitBreaker>,
        fallback: Arc<FallbackSnapshot>,
        client: Arc<RegistryClient>,
        fetch_timeout: Duration,
        default_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            breaker,
            fallback,
            client,
            fetch_timeout,
            default_ttl,
        }
    }

    /// Wire a gateway from configuration: select the shared-tier
    /// backend, start the fallback sweeper, and load the fallback
    /// snapshot. Configuration problems surface here, never per-request.
    pub async fn from_config(config: &RegistryCoreConfig) -> Result<Arc<Self>> {
        let shared = select_backend(&config.cache).await;
        let cache = Arc::new(TieredCacheStore::new(shared, &config.cache));
        cache.spawn_sweeper(config.cache.sweep_interval());

        let breaker = Arc::new(CircuitBreaker::new(
            "upstream_registry".to_string(),
            (&config.circuit_breaker).into(),
        ));

        let fallback = match &config.monitor.fallback_snapshot_path {
            Some(path) => FallbackSnapshot::from_file(path)?,
            None => FallbackSnapshot::bundled()?,
        };

        let client = RegistryClient::new(&config.upstream)
            .map_err(|e| RegistryError::ConfigurationError(e.to_string()))?;

        Ok(Arc::new(Self::new(
            cache,
            breaker,
            Arc::new(fallback),
            Arc::new(client),
            config.upstream.fetch_timeout(),
            config.cache.default_ttl(),
        )))
    }

    /// Resolve a key through cache → upstream → fallback.
    ///
    /// 1. A live cache entry is returned immediately with
    ///    `source: "cache"`; no upstream call is made.
    /// 2. On a miss the fetcher runs through the circuit breaker under
    ///    the fetch timeout; success populates both cache tiers and
    ///    returns `source: "upstream"`. Timeouts count as failures.
    /// 3. Breaker-open rejections and upstream failures resolve against
    ///    the fallback snapshot; a missing fallback entry yields the
    ///    only error-carrying response shape.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Duration,
    ) -> RegistryResponse<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let started = Instant::now();

        if let Some(value) = self.cache.get(key).await {
            match serde_json::from_value::<T>(value) {
                Ok(data) => {
                    log_gateway_operation(
                        "fetch",
                        key,
                        "cache",
                        "success",
                        Some(started.elapsed().as_millis() as u64),
                        None,
                    );
                    return RegistryResponse::from_cache(data);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cached payload incompatible, refetching");
                }
            }
        }

        let outcome = self
            .breaker
            .call(|| async {
                match tokio::time::timeout(self.fetch_timeout, fetcher()).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!(
                        "upstream call timed out after {}s",
                        self.fetch_timeout.as_secs()
                    )),
                }
            })
            .await;

        match outcome {
            Ok(data) => {
                match serde_json::to_value(&data) {
                    Ok(value) => {
                        self.cache.set(key, value, ttl).await;
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Upstream payload not cacheable");
                    }
                }
                log_gateway_operation(
                    "fetch",
                    key,
                    "upstream",
                    "success",
                    Some(started.elapsed().as_millis() as u64),
                    None,
                );
                RegistryResponse::from_upstream(data)
            }
            Err(CircuitBreakerError::CircuitOpen { .. }) => {
                debug!(key = %key, "Breaker open, skipping upstream");
                self.serve_fallback(key, started, "breaker open")
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                log_error("gateway", "fetch", &e.to_string(), Some(key));
                self.serve_fallback(key, started, "upstream failed")
            }
        }
    }

    /// Fetch with the configured default TTL
    pub async fn fetch_with_default_ttl<T, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
    ) -> RegistryResponse<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.fetch(key, fetcher, self.default_ttl).await
    }

    fn serve_fallback<T: DeserializeOwned>(
        &self,
        key: &str,
        started: Instant,
        reason: &str,
    ) -> RegistryResponse<T> {
        match self.fallback.get(key) {
            Some(value) => match serde_json::from_value::<T>(value.clone()) {
                Ok(data) => {
                    log_gateway_operation(
                        "fetch",
                        key,
                        "fallback",
                        "degraded",
                        Some(started.elapsed().as_millis() as u64),
                        Some(reason),
                    );
                    RegistryResponse::from_fallback(data)
                }
                Err(e) => {
                    log_error(
                        "gateway",
                        "serve_fallback",
                        &e.to_string(),
                        Some(key),
                    );
                    RegistryResponse::unavailable(format!(
                        "fallback entry for '{key}' is incompatible: {e}"
                    ))
                }
            },
            None => {
                log_gateway_operation(
                    "fetch",
                    key,
                    "fallback",
                    "unavailable",
                    Some(started.elapsed().as_millis() as u64),
                    Some(reason),
                );
                RegistryResponse::unavailable(format!(
                    "no data available for '{key}': {reason} and no fallback entry"
                ))
            }
        }
    }

    /// Fetch a single agent profile through the resilience layer
    pub async fn get_agent(&self, id: &str) -> RegistryResponse<Value> {
        let client = Arc::clone(&self.client);
        let agent_id = id.to_string();
        self.fetch(
            &keys::agent(id),
            move || async move {
                client
                    .fetch_agent(&agent_id)
                    .await
                    .map_err(anyhow::Error::from)
            },
            self.default_ttl,
        )
        .await
    }

    /// Fetch the full agent listing through the resilience layer
    pub async fn list_agents(&self) -> RegistryResponse<Value> {
        let client = Arc::clone(&self.client);
        self.fetch(
            &keys::agent_list(),
            move || async move { client.fetch_agents().await.map_err(anyhow::Error::from) },
            self.default_ttl,
        )
        .await
    }

    /// Remove a single key from both cache tiers
    pub async fn invalidate(&self, key: &str) -> bool {
        self.cache.del(key).await
    }

    /// Remove every cached key matching a `*` wildcard pattern
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        self.cache.invalidate_pattern(pattern).await
    }

    pub fn cache(&self) -> &Arc<TieredCacheStore> {
        &self.cache
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn fallback_snapshot(&self) -> &Arc<FallbackSnapshot> {
        &self.fallback
    }

    pub fn client(&self) -> &Arc<RegistryClient> {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::distributed::NullDistributedCache;
    use crate::config::{CacheSettings, UpstreamSettings};
    use crate::gateway::response::DataSource;
    use crate::resilience::CircuitBreakerConfig;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn test_gateway(fallback_entries: BTreeMap<String, Value>) -> RegistryGateway {
        let cache = Arc::new(TieredCacheStore::new(
            Arc::new(NullDistributedCache),
            &CacheSettings::default(),
        ));
        let breaker = Arc::new(CircuitBreaker::new(
            "test".to_string(),
            CircuitBreakerConfig::default(),
        ));
        let fallback = Arc::new(FallbackSnapshot::from_entries("test.1", fallback_entries));
        let client = Arc::new(RegistryClient::new(&UpstreamSettings::default()).unwrap());
        RegistryGateway::new(
            cache,
            breaker,
            fallback,
            client,
            Duration::from_secs(5),
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_upstream_success_populates_cache() {
        let gateway = test_gateway(BTreeMap::new());

        let response = gateway
            .fetch(
                "agent-1",
                || async { Ok(json!({"name": "X"})) },
                Duration::from_secs(300),
            )
            .await;
        assert_eq!(response.source, DataSource::Upstream);
        assert_eq!(response.data, Some(json!({"name": "X"})));

        // Second read is a cache hit; the fetcher must not run
        let response: RegistryResponse<Value> = gateway
            .fetch(
                "agent-1",
                || async { panic!("fetcher should not be invoked on a cache hit") },
                Duration::from_secs(300),
            )
            .await;
        assert_eq!(response.source, DataSource::Cache);
        assert_eq!(response.data, Some(json!({"name": "X"})));
    }

    #[tokio::test]
    async fn test_upstream_failure_serves_fallback() {
        let mut entries = BTreeMap::new();
        entries.insert("agent-2".to_string(), json!({"name": "Fallback"}));
        let gateway = test_gateway(entries);

        let response: RegistryResponse<Value> = gateway
            .fetch(
                "agent-2",
                || async { Err(anyhow::anyhow!("connection refused")) },
                Duration::from_secs(300),
            )
            .await;
        assert_eq!(response.source, DataSource::Fallback);
        assert_eq!(response.data, Some(json!({"name": "Fallback"})));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_without_fallback_is_error_response() {
        let gateway = test_gateway(BTreeMap::new());

        let response: RegistryResponse<Value> = gateway
            .fetch(
                "agent-9",
                || async { Err(anyhow::anyhow!("connection refused")) },
                Duration::from_secs(300),
            )
            .await;
        assert_eq!(response.source, DataSource::Fallback);
        assert!(response.data.is_none());
        assert!(response.error.is_some());
    }
}
