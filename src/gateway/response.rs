//! Response envelope with mandatory data provenance

use serde::{Deserialize, Serialize};

/// Which layer satisfied a gateway call. Consumers use this to
/// distinguish authoritative data from degraded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Upstream,
    Cache,
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Upstream => "upstream",
            DataSource::Cache => "cache",
            DataSource::Fallback => "fallback",
        }
    }
}

/// The unit the gateway returns to consumers. All failure is expressed
/// through this shape; `error` is only set when there is genuinely
/// nothing to serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub source: DataSource,
}

impl<T> RegistryResponse<T> {
    pub fn from_upstream(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            source: DataSource::Upstream,
        }
    }

    pub fn from_cache(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            source: DataSource::Cache,
        }
    }

    pub fn from_fallback(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            source: DataSource::Fallback,
        }
    }

    /// The only case that carries an error: upstream unavailable and no
    /// fallback entry exists for the key.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            source: DataSource::Fallback,
        }
    }

    /// Anything not served by the upstream is degraded data
    pub fn is_degraded(&self) -> bool {
        self.source != DataSource::Upstream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_serializes_snake_case() {
        let response = RegistryResponse::from_upstream(json!({"id": "agent-1"}));
        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["source"], "upstream");
        assert!(serialized.get("error").is_none());
    }

    #[test]
    fn test_unavailable_carries_error_without_data() {
        let response: RegistryResponse<serde_json::Value> =
            RegistryResponse::unavailable("no data for 'agent-9'");
        assert!(response.data.is_none());
        assert!(response.error.is_some());
        assert_eq!(response.source, DataSource::Fallback);
        assert!(response.is_degraded());
    }
}
