//! Fallback-tier cache entry with TTL liveness

use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Entry in the in-process fallback tier. The payload is opaque JSON;
/// liveness is decided entirely by `cached_at` and `ttl`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Value,
    cached_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// An entry is live iff less than `ttl` has elapsed since it was cached
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.cached_at.elapsed())
    }
}
