#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Registry Core
//!
//! Resilient data-access core fronting the persona registry service.
//!
//! ## Overview
//!
//! Application code never talks to the upstream registry directly: every
//! read goes through a [`gateway::RegistryGateway`] that orchestrates a
//! two-tier cache, a circuit breaker, and a bundled fallback snapshot.
//! Every response carries explicit data provenance so consumers can
//! distinguish authoritative data from degraded data, and the gateway
//! never throws - all failure is expressed through the response shape.
//!
//! ## Module Organization
//!
//! - [`cache`] - Tiered cache store with TTL and pattern invalidation
//! - [`resilience`] - Circuit breaker isolating the upstream dependency
//! - [`gateway`] - The façade application code calls
//! - [`monitor`] - Health classification and consistency drift checks
//! - [`client`] - HTTP client for the upstream registry API
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured tracing setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use registry_core::config::ConfigManager;
//! use registry_core::gateway::RegistryGateway;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! registry_core::logging::init_structured_logging();
//!
//! let manager = ConfigManager::load()?;
//! let gateway = RegistryGateway::from_config(manager.config()).await?;
//!
//! let response = gateway.get_agent("agent-1").await;
//! match response.source {
//!     registry_core::gateway::DataSource::Upstream => { /* authoritative */ }
//!     _ => { /* render a degraded-data banner */ }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod monitor;
pub mod resilience;

pub use cache::{CacheStats, TieredCacheStore};
pub use config::{ConfigManager, RegistryCoreConfig};
pub use constants::{CheckStatus, HealthStatus};
pub use error::{RegistryError, Result};
pub use gateway::{DataSource, FallbackSnapshot, RegistryGateway, RegistryResponse};
pub use monitor::{ConsistencyCheckResult, ConsistencyMonitor, HealthMonitor, HealthReport};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
