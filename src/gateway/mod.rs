//! # Registry Gateway
//!
//! The façade application code calls for registry data. Orchestrates the
//! tiered cache, the circuit breaker, and the bundled fallback snapshot
//! so that every request resolves to a response object with explicit
//! data provenance - the gateway never throws to the caller.
//!
//! ## Data flow
//!
//! ```text
//! consumer → Gateway → cache hit?            → source: "cache"
//!                    → breaker → upstream ok → source: "upstream"
//!                    → fallback snapshot     → source: "fallback"
//!                    → nothing to serve      → error response
//! ```

pub mod fallback;
pub mod keys;
pub mod registry_gateway;
pub mod response;

pub use fallback::FallbackSnapshot;
pub use registry_gateway::RegistryGateway;
pub use response::{DataSource, RegistryResponse};
