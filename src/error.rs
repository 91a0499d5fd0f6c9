use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    CacheError(String),
    UpstreamError(String),
    FallbackError(String),
    ConfigurationError(String),
    MonitorError(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CacheError(msg) => write!(f, "Cache error: {msg}"),
            RegistryError::UpstreamError(msg) => write!(f, "Upstream error: {msg}"),
            RegistryError::FallbackError(msg) => write!(f, "Fallback error: {msg}"),
            RegistryError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            RegistryError::MonitorError(msg) => write!(f, "Monitor error: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {}

pub type Result<T> = std::result::Result<T, RegistryError>;
