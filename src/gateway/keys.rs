//! Cache key conventions for registry entities
//!
//! Keys are opaque to the cache; this module is the single place the
//! key format is defined so call sites and invalidation patterns stay
//! in agreement.

/// Cache key for a single agent profile
pub fn agent(id: &str) -> String {
    format!("agent-{id}")
}

/// Pattern invalidating an agent and everything derived from it
pub fn agent_pattern(id: &str) -> String {
    format!("agent-{id}*")
}

/// Cache key for the full agent listing
pub fn agent_list() -> String {
    "agents-all".to_string()
}

/// Upstream API path for a cache key. Used by the consistency monitor
/// to fetch live counterparts of snapshot entries.
pub fn upstream_path(key: &str) -> String {
    if key == agent_list() {
        return "agents".to_string();
    }
    if let Some(id) = key.strip_prefix("agent-") {
        return format!("agents/{id}");
    }
    key.to_string()
}
