//! Circuit breaker configuration

use std::time::Duration;

use crate::config::CircuitBreakerSettings;
use crate::constants::defaults;

/// Thresholds governing a single circuit breaker instance
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// How long the circuit stays open before admitting a trial call
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::CIRCUIT_FAILURE_THRESHOLD,
            cooldown: defaults::CIRCUIT_COOLDOWN,
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            cooldown: settings.cooldown(),
        }
    }
}
