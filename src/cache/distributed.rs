//! Shared-tier capability interface
//!
//! The shared cache backend is a network key-value service that may be
//! absent entirely. Gateway code never branches on "is the backend
//! loaded": it always talks to a `DistributedCache`, and deployments
//! without a backend get `NullDistributedCache`, which reports
//! unreachable on every call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::pattern::matches_pattern;

/// Errors from a single shared-tier operation
#[derive(Debug, Error)]
pub enum TierError {
    /// Backend could not be reached at all
    #[error("Shared cache tier unreachable: {0}")]
    Unreachable(String),

    /// Backend was reached but the operation failed
    #[error("Shared cache tier operation failed: {0}")]
    Operation(String),
}

pub type TierResult<T> = std::result::Result<T, TierError>;

/// Capability interface over the shared out-of-process cache tier
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Get raw bytes by key; `None` means absent or expired server-side
    async fn get(&self, key: &str) -> TierResult<Option<Vec<u8>>>;

    /// Store raw bytes with a server-side expiry
    async fn set_with_expiry(&self, key: &str, ttl: Duration, value: &[u8]) -> TierResult<()>;

    /// Delete a key; returns whether it existed
    async fn del(&self, key: &str) -> TierResult<bool>;

    /// Delete a batch of keys; returns how many were removed
    async fn del_many(&self, keys: &[String]) -> TierResult<usize>;

    /// List keys matching a `*` wildcard pattern
    async fn keys(&self, pattern: &str) -> TierResult<Vec<String>>;

    /// Liveness probe against the backend
    async fn ping(&self) -> TierResult<()>;
}

/// Shared tier stand-in for deployments without a backend. Always
/// reports unreachable so the store degrades to the fallback tier.
pub struct NullDistributedCache;

#[async_trait]
impl DistributedCache for NullDistributedCache {
    async fn get(&self, _key: &str) -> TierResult<Option<Vec<u8>>> {
        Err(TierError::Unreachable("no backend configured".to_string()))
    }

    async fn set_with_expiry(&self, _key: &str, _ttl: Duration, _value: &[u8]) -> TierResult<()> {
        Err(TierError::Unreachable("no backend configured".to_string()))
    }

    async fn del(&self, _key: &str) -> TierResult<bool> {
        Err(TierError::Unreachable("no backend configured".to_string()))
    }

    async fn del_many(&self, _keys: &[String]) -> TierResult<usize> {
        Err(TierError::Unreachable("no backend configured".to_string()))
    }

    async fn keys(&self, _pattern: &str) -> TierResult<Vec<String>> {
        Err(TierError::Unreachable("no backend configured".to_string()))
    }

    async fn ping(&self) -> TierResult<()> {
        Err(TierError::Unreachable("no backend configured".to_string()))
    }
}

/// In-memory implementation of the shared-tier interface. Used by tests
/// and single-process deployments that want shared-tier semantics
/// (server-side expiry, pattern listing) without a network backend.
#[derive(Default)]
pub struct InMemoryDistributedCache {
    entries: RwLock<HashMap<String, StoredValue>>,
}

struct StoredValue {
    data: Vec<u8>,
    expires_at: Instant,
}

impl InMemoryDistributedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries currently stored
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|v| v.expires_at > Instant::now()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DistributedCache for InMemoryDistributedCache {
    async fn get(&self, key: &str) -> TierResult<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => Ok(Some(stored.data.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, ttl: Duration, value: &[u8]) -> TierResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredValue {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> TierResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some())
    }

    async fn del_many(&self, keys: &[String]) -> TierResult<usize> {
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for key in keys {
            if entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> TierResult<Vec<String>> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .iter()
            .filter(|(key, stored)| stored.expires_at > now && matches_pattern(key, pattern))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn ping(&self) -> TierResult<()> {
        Ok(())
    }
}

/// Select the shared-tier backend for the given settings. Backend
/// absence or startup unreachability is a soft failure: the store
/// degrades to the fallback tier behind a `NullDistributedCache`.
pub async fn select_backend(
    settings: &crate::config::CacheSettings,
) -> std::sync::Arc<dyn DistributedCache> {
    use std::sync::Arc;
    use tracing::warn;

    match &settings.redis_url {
        None => Arc::new(NullDistributedCache),
        Some(url) => {
            #[cfg(feature = "redis-backend")]
            {
                match redis_backend::RedisDistributedCache::connect(url).await {
                    Ok(backend) => return Arc::new(backend),
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Shared cache backend unreachable at startup, fallback tier only"
                        );
                        return Arc::new(NullDistributedCache);
                    }
                }
            }
            #[cfg(not(feature = "redis-backend"))]
            {
                warn!(
                    url = %url,
                    "redis_url configured but the redis-backend feature is not enabled"
                );
                Arc::new(NullDistributedCache)
            }
        }
    }
}

/// Redis-backed shared tier, selected when a `redis_url` is configured.
#[cfg(feature = "redis-backend")]
pub mod redis_backend {
    use super::*;
    use ::redis::{aio::MultiplexedConnection, AsyncCommands, Client};

    pub struct RedisDistributedCache {
        conn: MultiplexedConnection,
    }

    impl RedisDistributedCache {
        pub async fn connect(url: &str) -> TierResult<Self> {
            let client = Client::open(url)
                .map_err(|e| TierError::Unreachable(format!("redis client: {e}")))?;
            let conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| TierError::Unreachable(format!("redis connection: {e}")))?;
            Ok(Self { conn })
        }
    }

    #[async_trait]
    impl DistributedCache for RedisDistributedCache {
        async fn get(&self, key: &str) -> TierResult<Option<Vec<u8>>> {
            let mut conn = self.conn.clone();
            conn.get(key)
                .await
                .map_err(|e| TierError::Operation(format!("GET: {e}")))
        }

        async fn set_with_expiry(
            &self,
            key: &str,
            ttl: Duration,
            value: &[u8],
        ) -> TierResult<()> {
            let mut conn = self.conn.clone();
            let _: () = conn
                .set_ex(key, value, ttl.as_secs())
                .await
                .map_err(|e| TierError::Operation(format!("SETEX: {e}")))?;
            Ok(())
        }

        async fn del(&self, key: &str) -> TierResult<bool> {
            let mut conn = self.conn.clone();
            let removed: i64 = conn
                .del(key)
                .await
                .map_err(|e| TierError::Operation(format!("DEL: {e}")))?;
            Ok(removed > 0)
        }

        async fn del_many(&self, keys: &[String]) -> TierResult<usize> {
            if keys.is_empty() {
                return Ok(0);
            }
            let mut conn = self.conn.clone();
            let removed: i64 = conn
                .del(keys)
                .await
                .map_err(|e| TierError::Operation(format!("DEL: {e}")))?;
            Ok(removed as usize)
        }

        async fn keys(&self, pattern: &str) -> TierResult<Vec<String>> {
            let mut conn = self.conn.clone();
            conn.keys(pattern)
                .await
                .map_err(|e| TierError::Operation(format!("KEYS: {e}")))
        }

        async fn ping(&self) -> TierResult<()> {
            let mut conn = self.conn.clone();
            let _: String = ::redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| TierError::Unreachable(format!("PING: {e}")))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_tier_reports_unreachable() {
        let tier = NullDistributedCache;
        assert!(matches!(
            tier.get("k").await,
            Err(TierError::Unreachable(_))
        ));
        assert!(tier.ping().await.is_err());
        assert!(tier
            .set_with_expiry("k", Duration::from_secs(60), b"v")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_in_memory_tier_round_trip() {
        let tier = InMemoryDistributedCache::new();
        tier.set_with_expiry("k", Duration::from_secs(60), b"value")
            .await
            .unwrap();
        assert_eq!(tier.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert!(tier.del("k").await.unwrap());
        assert_eq!(tier.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_tier_honors_expiry() {
        let tier = InMemoryDistributedCache::new();
        tier.set_with_expiry("k", Duration::from_secs(30), b"v")
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(tier.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_tier_pattern_listing() {
        let tier = InMemoryDistributedCache::new();
        let ttl = Duration::from_secs(60);
        tier.set_with_expiry("agent-1", ttl, b"a").await.unwrap();
        tier.set_with_expiry("agent-2", ttl, b"b").await.unwrap();
        tier.set_with_expiry("other", ttl, b"c").await.unwrap();

        let mut keys = tier.keys("agent-*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["agent-1", "agent-2"]);
    }
}
