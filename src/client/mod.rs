//! # Upstream Registry Client
//!
//! Thin HTTP client for the upstream source-of-truth service. The core
//! treats the upstream as fetcher functions supplied by call sites; this
//! client is where the gateway's convenience operations and the
//! consistency monitor get theirs.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::UpstreamSettings;

/// Errors from a single upstream request
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure (connect, timeout, body read)
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {status} for '{path}'")]
    Status { status: u16, path: String },
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// HTTP client bound to the upstream registry base URL
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(settings: &UpstreamSettings) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Fetch a JSON document from a path under the base URL
    pub async fn get_json(&self, path: &str) -> ClientResult<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(url = %url, "Upstream GET");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        Ok(response.json().await?)
    }

    /// Fetch a single agent profile
    pub async fn fetch_agent(&self, id: &str) -> ClientResult<Value> {
        self.get_json(&format!("agents/{id}")).await
    }

    /// Fetch the full agent listing
    pub async fn fetch_agents(&self) -> ClientResult<Value> {
        self.get_json("agents").await
    }

    /// Fetch the live counterpart of a cache key (consistency monitor)
    pub async fn fetch_by_key(&self, key: &str) -> ClientResult<Value> {
        self.get_json(&crate::gateway::keys::upstream_path(key)).await
    }

    /// Liveness probe against the upstream health endpoint
    pub async fn ping(&self) -> ClientResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                path: "/health".to_string(),
            });
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let settings = UpstreamSettings {
            base_url: "http://registry.internal/".to_string(),
            ..Default::default()
        };
        let client = RegistryClient::new(&settings).unwrap();
        assert_eq!(client.base_url(), "http://registry.internal");
    }
}
