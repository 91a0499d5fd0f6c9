//! # Resilience Module
//!
//! Fault isolation for the upstream registry dependency. Implements the
//! classic three-state circuit breaker so that a failing upstream is
//! isolated for a cool-down period instead of being hammered by every
//! request, giving the gateway a cheap signal to serve degraded data.
//!
//! ## Architecture
//!
//! - **Circuit Breaker**: Closed → Open → Half-Open state machine with
//!   atomic transitions and a single-occupancy trial slot
//! - **Metrics Collection**: failure rates and transition counters
//! - **Configuration**: thresholds and cool-down settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use registry_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     cooldown: Duration::from_secs(30),
//! };
//!
//! let breaker = CircuitBreaker::new("upstream_registry".to_string(), config);
//!
//! let result = breaker
//!     .call(|| async { Ok::<&str, Box<dyn std::error::Error>>("success") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod metrics;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerSnapshot, CircuitState,
};
pub use config::CircuitBreakerConfig;
pub use metrics::CircuitBreakerMetrics;
