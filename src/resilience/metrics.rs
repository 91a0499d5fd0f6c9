//! Circuit breaker metrics tracking

use std::time::Duration;

/// Counters accumulated across a breaker's lifetime, plus derived rates
/// filled in when a snapshot is taken
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerMetrics {
    /// Total operations attempted through the breaker
    pub total_calls: u64,

    /// Operations that completed successfully
    pub success_count: u64,

    /// Operations that failed (including timeouts and cancellations)
    pub failure_count: u64,

    /// Failures since the last success while Closed
    pub consecutive_failures: u64,

    /// Cumulative wall time spent in operations
    pub total_duration: Duration,

    /// Derived: failure_count / total_calls
    pub failure_rate: f64,

    /// Derived: success_count / total_calls
    pub success_rate: f64,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
