//! # Circuit Breaker Implementation
//!
//! Fault isolation for the upstream registry dependency. Follows the
//! classic three-state pattern: Closed (normal operation), Open (failing
//! fast), and Half-Open (testing recovery with a single trial call).

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - a single trial call is in flight
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Serializable view of breaker state for health reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u64,
    /// Seconds since the circuit opened; absent unless Open/Half-Open
    pub open_for_seconds: Option<u64>,
}

/// Permit classes handed out by the admission check. The trial permit is
/// the one whose outcome drives Half-Open transitions.
enum CallPermit {
    Normal,
    Trial,
}

/// Core circuit breaker implementation with atomic state management
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    /// Current circuit state (atomic for thread safety)
    state: AtomicU8,

    /// Configuration parameters
    config: CircuitBreakerConfig,

    /// Metrics tracking protected by mutex
    metrics: Arc<Mutex<CircuitBreakerMetrics>>,

    /// Time when circuit was opened (for cool-down calculations)
    opened_at: Arc<Mutex<Option<Instant>>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            cooldown_seconds = config.cooldown.as_secs(),
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            metrics: Arc::new(Mutex::new(CircuitBreakerMetrics::new())),
            opened_at: Arc::new(Mutex::new(None)),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.try_acquire().await {
            Some(permit) => permit,
            None => {
                return Err(CircuitBreakerError::CircuitOpen {
                    component: self.name.clone(),
                })
            }
        };

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Ok(_) => self.record_success(permit, duration).await,
            Err(_) => self.record_failure(permit, duration).await,
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Decide whether a call may proceed, claiming the Half-Open trial
    /// slot when the cool-down has elapsed. Returns `None` when the call
    /// must be rejected.
    async fn try_acquire(&self) -> Option<CallPermit> {
        match self.state() {
            CircuitState::Closed => Some(CallPermit::Normal),
            CircuitState::Open => {
                let opened_at = self.opened_at.lock().await;
                match *opened_at {
                    Some(opened_time) if opened_time.elapsed() >= self.config.cooldown => {
                        // Exactly one caller wins the transition; losers
                        // stay rejected as if the circuit were still open.
                        let claimed = self
                            .state
                            .compare_exchange(
                                CircuitState::Open as u8,
                                CircuitState::HalfOpen as u8,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok();
                        if claimed {
                            info!(
                                component = %self.name,
                                "🟡 Circuit breaker half-open (testing recovery)"
                            );
                            Some(CallPermit::Trial)
                        } else {
                            None
                        }
                    }
                    Some(_) => None,
                    None => {
                        warn!(component = %self.name, "Circuit open but no timestamp recorded");
                        Some(CallPermit::Normal)
                    }
                }
            }
            CircuitState::HalfOpen => {
                // A trial whose future was dropped never reports back;
                // after two cool-downs the slot counts as abandoned and
                // may be reclaimed by one caller.
                let mut opened_at = self.opened_at.lock().await;
                match *opened_at {
                    Some(opened_time)
                        if opened_time.elapsed() >= self.config.cooldown * 2 =>
                    {
                        *opened_at = Some(Instant::now());
                        warn!(
                            component = %self.name,
                            "Half-open trial abandoned, reclaiming trial slot"
                        );
                        Some(CallPermit::Trial)
                    }
                    _ => None,
                }
            }
        }
    }

    /// Record a successful operation
    async fn record_success(&self, permit: CallPermit, duration: Duration) {
        {
            let mut metrics = self.metrics.lock().await;
            metrics.total_calls += 1;
            metrics.success_count += 1;
            metrics.total_duration += duration;
        }

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            "🟢 Operation succeeded"
        );

        match permit {
            CallPermit::Trial => self.transition_to_closed().await,
            CallPermit::Normal => {
                if self.state() == CircuitState::Closed {
                    let mut metrics = self.metrics.lock().await;
                    metrics.consecutive_failures = 0;
                }
            }
        }
    }

    /// Record a failed operation
    async fn record_failure(&self, permit: CallPermit, duration: Duration) {
        {
            let mut metrics = self.metrics.lock().await;
            metrics.total_calls += 1;
            metrics.failure_count += 1;
            metrics.total_duration += duration;
        }

        error!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            "🔴 Operation failed"
        );

        match permit {
            // A failed trial reopens the circuit and restarts the cool-down
            CallPermit::Trial => self.transition_to_open().await,
            CallPermit::Normal => {
                if self.state() == CircuitState::Closed {
                    let consecutive = {
                        let mut metrics = self.metrics.lock().await;
                        metrics.consecutive_failures += 1;
                        metrics.consecutive_failures
                    };
                    if consecutive >= u64::from(self.config.failure_threshold) {
                        self.transition_to_open().await;
                    }
                }
            }
        }
    }

    /// Transition to closed state (normal operation)
    async fn transition_to_closed(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);

        let mut metrics = self.metrics.lock().await;
        metrics.consecutive_failures = 0;

        let mut opened_at = self.opened_at.lock().await;
        *opened_at = None;

        info!(
            component = %self.name,
            total_calls = metrics.total_calls,
            "🟢 Circuit breaker closed (recovered)"
        );
    }

    /// Transition to open state (failing fast)
    async fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);

        let mut opened_at = self.opened_at.lock().await;
        *opened_at = Some(Instant::now());

        let metrics = self.metrics.lock().await;
        error!(
            component = %self.name,
            consecutive_failures = metrics.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            cooldown_seconds = self.config.cooldown.as_secs(),
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    /// Force circuit to open state (for emergency situations)
    pub async fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        self.transition_to_open().await;
    }

    /// Force circuit to closed state (for emergency recovery)
    pub async fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        self.transition_to_closed().await;
    }

    /// Get current metrics snapshot with derived rates
    pub async fn metrics(&self) -> CircuitBreakerMetrics {
        let metrics = self.metrics.lock().await;
        let mut snapshot = metrics.clone();

        if metrics.total_calls > 0 {
            snapshot.failure_rate = metrics.failure_count as f64 / metrics.total_calls as f64;
            snapshot.success_rate = metrics.success_count as f64 / metrics.total_calls as f64;
        }

        snapshot
    }

    /// Serializable state snapshot for health reports
    pub async fn snapshot(&self) -> CircuitBreakerSnapshot {
        let metrics = self.metrics.lock().await;
        let opened_at = self.opened_at.lock().await;

        CircuitBreakerSnapshot {
            state: self.state(),
            failure_count: metrics.consecutive_failures,
            open_for_seconds: opened_at.map(|opened| opened.elapsed().as_secs()),
        }
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }
}
