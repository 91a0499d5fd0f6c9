//! # Tiered Cache Store
//!
//! Two-tier cache backing the registry gateway: a shared out-of-process
//! tier (reachable over the network, may be absent) and an in-process
//! fallback tier (always available, process-lifetime only).
//!
//! ## Architecture
//!
//! - **`DistributedCache`**: capability interface over the shared tier,
//!   with a null implementation selected when no backend is configured
//! - **`TieredCacheStore`**: orchestrates both tiers so that total failure
//!   of the shared tier degrades capability but never fails a read/write
//! - **Pattern invalidation**: `*` wildcard bulk removal across both tiers
//! - **TTL**: lazy expiry on read plus a periodic background sweep

pub mod distributed;
pub mod entry;
pub mod pattern;
pub mod store;

pub use distributed::{
    DistributedCache, InMemoryDistributedCache, NullDistributedCache, TierError, TierResult,
};
pub use entry::CacheEntry;
pub use pattern::matches_pattern;
pub use store::{CacheStats, TieredCacheStore};

#[cfg(feature = "redis-backend")]
pub use distributed::redis_backend::RedisDistributedCache;
