//! Two-tier cache store
//!
//! Reads check the shared tier first and silently fall through to the
//! in-process fallback tier on any tier error; writes are best-effort
//! against the shared tier and unconditional against the fallback tier,
//! so the fallback tier is always a superset safety net. Total failure
//! of the shared tier degrades capability (no cross-process sharing, no
//! compression) but never fails a read or write outright.

use dashmap::DashMap;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::distributed::DistributedCache;
use super::entry::CacheEntry;
use super::pattern::matches_pattern;
use crate::config::CacheSettings;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub expirations: u64,
    pub fallback_entries: u64,
}

impl CacheStats {
    /// Hit rate over all reads; absent until there has been traffic
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        if total == 0 {
            None
        } else {
            Some(self.hits as f64 / total as f64)
        }
    }
}

/// Tiered cache store orchestrating the shared and fallback tiers
pub struct TieredCacheStore {
    shared: Arc<dyn DistributedCache>,
    fallback: DashMap<String, CacheEntry>,
    stats: RwLock<CacheStats>,
    key_prefix: String,
    compression_threshold: usize,
}

impl TieredCacheStore {
    pub fn new(shared: Arc<dyn DistributedCache>, settings: &CacheSettings) -> Self {
        Self {
            shared,
            fallback: DashMap::new(),
            stats: RwLock::new(CacheStats::default()),
            key_prefix: settings.key_prefix.clone(),
            compression_threshold: settings.compression_threshold_bytes,
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Get a live value from either tier. Shared-tier errors never
    /// propagate; an expired fallback entry is treated as absent and
    /// removed.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.shared.get(&self.prefixed(key)).await {
            Ok(Some(bytes)) => match Self::decode_payload(&bytes) {
                Some(value) => {
                    self.stats.write().hits += 1;
                    debug!(key = %key, tier = "shared", "Cache hit");
                    return Some(value);
                }
                None => {
                    warn!(key = %key, "Discarding undecodable shared-tier payload");
                }
            },
            Ok(None) => {}
            Err(e) => {
                debug!(key = %key, error = %e, "Shared tier read failed, falling through");
            }
        }

        if let Some(entry) = self.fallback.get(key) {
            let cached = entry.value();
            if !cached.is_expired() {
                let value = cached.value().clone();
                drop(entry);
                self.stats.write().hits += 1;
                debug!(key = %key, tier = "fallback", "Cache hit");
                return Some(value);
            }
        }

        // Expired entries are eagerly removed; the liveness re-check in
        // remove_if keeps a concurrent fresh write from being deleted.
        if self
            .fallback
            .remove_if(key, |_, entry| entry.is_expired())
            .is_some()
        {
            self.stats.write().expirations += 1;
        }

        self.stats.write().misses += 1;
        None
    }

    /// Write to both tiers. The shared-tier write is best-effort and its
    /// failure is logged, never propagated; the fallback write always
    /// happens. Returns whether the shared tier accepted the write.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let shared_ok = match serde_json::to_vec(&value) {
            Ok(bytes) => {
                let payload = self.encode_payload(bytes);
                match self
                    .shared
                    .set_with_expiry(&self.prefixed(key), ttl, &payload)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(key = %key, error = %e, "Shared tier write failed, fallback tier only");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Payload serialization failed, fallback tier only");
                false
            }
        };

        self.fallback
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        self.stats.write().sets += 1;
        shared_ok
    }

    /// Remove from both tiers. Tier-level failures are independent; the
    /// fallback removal is always attempted.
    pub async fn del(&self, key: &str) -> bool {
        let shared_removed = match self.shared.del(&self.prefixed(key)).await {
            Ok(removed) => removed,
            Err(e) => {
                debug!(key = %key, error = %e, "Shared tier delete failed");
                false
            }
        };

        let fallback_removed = self.fallback.remove(key).is_some();
        let removed = shared_removed || fallback_removed;
        if removed {
            self.stats.write().deletes += 1;
        }
        removed
    }

    /// Delete every key matching a `*` wildcard pattern across both
    /// tiers, returning the total removed. An unreachable tier
    /// contributes zero without failing the call.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let shared_count = match self.shared.keys(&self.prefixed(pattern)).await {
            Ok(keys) => match self.shared.del_many(&keys).await {
                Ok(count) => count,
                Err(e) => {
                    debug!(pattern = %pattern, error = %e, "Shared tier bulk delete failed");
                    0
                }
            },
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "Shared tier key listing failed");
                0
            }
        };

        let matching: Vec<String> = self
            .fallback
            .iter()
            .filter(|entry| matches_pattern(entry.key(), pattern))
            .map(|entry| entry.key().clone())
            .collect();

        let mut fallback_count = 0;
        for key in matching {
            if self.fallback.remove(&key).is_some() {
                fallback_count += 1;
            }
        }

        let total = shared_count + fallback_count;
        debug!(
            pattern = %pattern,
            shared = shared_count,
            fallback = fallback_count,
            "🧹 Pattern invalidation complete"
        );
        total
    }

    /// Remove expired fallback entries. The shared tier expires its own
    /// entries server-side. Safe to run concurrently with reads and
    /// writes; a fresh entry written mid-sweep survives the liveness
    /// re-check in remove_if.
    pub fn sweep_expired(&self) -> usize {
        let candidates: Vec<String> = self
            .fallback
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in candidates {
            if self
                .fallback
                .remove_if(&key, |_, entry| entry.is_expired())
                .is_some()
            {
                removed += 1;
            }
        }

        if removed > 0 {
            self.stats.write().expirations += removed as u64;
        }
        removed
    }

    /// Spawn the periodic background sweeper for the fallback tier
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired();
                if removed > 0 {
                    debug!(removed, "🧹 Swept expired fallback entries");
                }
            }
        })
    }

    /// Probe shared-tier reachability
    pub async fn shared_reachable(&self) -> bool {
        self.shared.ping().await.is_ok()
    }

    /// Number of entries currently held by the fallback tier
    pub fn fallback_len(&self) -> usize {
        self.fallback.len()
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.fallback_entries = self.fallback.len() as u64;
        stats
    }

    /// Gzip payloads at or above the configured threshold; smaller ones
    /// (and payloads compression would grow) pass through untouched.
    fn encode_payload(&self, bytes: Vec<u8>) -> Vec<u8> {
        if bytes.len() < self.compression_threshold {
            return bytes;
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(&bytes).is_err() {
            return bytes;
        }
        match encoder.finish() {
            Ok(compressed) if compressed.len() < bytes.len() => compressed,
            _ => bytes,
        }
    }

    /// Parse a shared-tier payload, inflating gzip-compressed ones.
    /// JSON text never begins with the gzip magic bytes.
    fn decode_payload(bytes: &[u8]) -> Option<Value> {
        if bytes.starts_with(&GZIP_MAGIC) {
            let mut decoder = GzDecoder::new(bytes);
            let mut inflated = Vec::new();
            decoder.read_to_end(&mut inflated).ok()?;
            serde_json::from_slice(&inflated).ok()
        } else {
            serde_json::from_slice(bytes).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::distributed::{InMemoryDistributedCache, NullDistributedCache};
    use serde_json::json;

    fn store_with_shared() -> (Arc<InMemoryDistributedCache>, TieredCacheStore) {
        let shared = Arc::new(InMemoryDistributedCache::new());
        let store = TieredCacheStore::new(shared.clone(), &CacheSettings::default());
        (shared, store)
    }

    fn store_without_shared() -> TieredCacheStore {
        TieredCacheStore::new(Arc::new(NullDistributedCache), &CacheSettings::default())
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let (_, store) = store_with_shared();
        let ttl = Duration::from_secs(300);

        store.set("agent-1", json!({"name": "X"}), ttl).await;
        assert_eq!(store.get("agent-1").await, Some(json!({"name": "X"})));
    }

    #[tokio::test]
    async fn test_set_populates_both_tiers() {
        let (shared, store) = store_with_shared();
        let ttl = Duration::from_secs(300);

        let shared_ok = store.set("agent-1", json!(1), ttl).await;
        assert!(shared_ok);
        assert_eq!(store.fallback_len(), 1);
        assert!(shared.get("registry:agent-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_operations_survive_unreachable_shared_tier() {
        let store = store_without_shared();
        let ttl = Duration::from_secs(300);

        let shared_ok = store.set("agent-1", json!({"name": "X"}), ttl).await;
        assert!(!shared_ok);
        assert_eq!(store.get("agent-1").await, Some(json!({"name": "X"})));
        assert!(store.del("agent-1").await);
        assert_eq!(store.get("agent-1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent_and_removed() {
        let store = store_without_shared();
        store.set("agent-1", json!(1), Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.get("agent-1").await, None);
        assert_eq!(store.fallback_len(), 0);
        assert_eq!(store.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_pattern_invalidation_counts_both_tiers() {
        let (_, store) = store_with_shared();
        let ttl = Duration::from_secs(300);

        store.set("agent-42", json!(1), ttl).await;
        store.set("agent-42-profile", json!(2), ttl).await;
        store.set("agent-7", json!(3), ttl).await;

        // Two keys removed from each tier
        let removed = store.invalidate_pattern("agent-42*").await;
        assert_eq!(removed, 4);
        assert_eq!(store.get("agent-42").await, None);
        assert_eq!(store.get("agent-42-profile").await, None);
        assert_eq!(store.get("agent-7").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_large_payload_compression_round_trip() {
        let (shared, store) = store_with_shared();
        let big = json!({"bio": "x".repeat(10_000)});

        store.set("agent-1", big.clone(), Duration::from_secs(300)).await;

        let raw = shared.get("registry:agent-1").await.unwrap().unwrap();
        assert!(raw.starts_with(&GZIP_MAGIC));
        assert!(raw.len() < 10_000);
        assert_eq!(store.get("agent-1").await, Some(big));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let store = store_without_shared();
        store.set("short", json!(1), Duration::from_secs(10)).await;
        store.set("long", json!(2), Duration::from_secs(1000)).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        let removed = store.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.fallback_len(), 1);
        assert_eq!(store.get("long").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_hit_rate_tracking() {
        let store = store_without_shared();
        assert_eq!(store.stats().hit_rate(), None);

        store.set("k", json!(1), Duration::from_secs(60)).await;
        let _ = store.get("k").await;
        let _ = store.get("k").await;
        let _ = store.get("missing").await;

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate().unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }
}
