//! Shared fixtures for integration tests
#![allow(dead_code)]

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use registry_core::cache::{InMemoryDistributedCache, NullDistributedCache, TieredCacheStore};
use registry_core::config::CacheSettings;
use registry_core::gateway::FallbackSnapshot;
use registry_core::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Minimal HTTP/1.1 stub standing in for the upstream registry.
/// Serves canned JSON per path; unknown paths get a 404.
pub async fn spawn_stub_registry(routes: HashMap<String, Value>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let routes = Arc::new(routes);
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                loop {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) => break,
                        Ok(n) => {
                            read += n;
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n")
                                || read == buf.len()
                            {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let (status, body) = match routes.get(&path) {
                    Some(value) => ("200 OK", value.to_string()),
                    None => ("404 Not Found", r#"{"error":"not found"}"#.to_string()),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), handle)
}

/// Cache store backed by an in-memory shared tier
pub fn cache_with_shared() -> (Arc<InMemoryDistributedCache>, Arc<TieredCacheStore>) {
    let shared = Arc::new(InMemoryDistributedCache::new());
    let store = Arc::new(TieredCacheStore::new(
        shared.clone(),
        &CacheSettings::default(),
    ));
    (shared, store)
}

/// Cache store whose shared tier is permanently unreachable
pub fn cache_without_shared() -> Arc<TieredCacheStore> {
    Arc::new(TieredCacheStore::new(
        Arc::new(NullDistributedCache),
        &CacheSettings::default(),
    ))
}

pub fn breaker(failure_threshold: u32, cooldown: std::time::Duration) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(
        "test_upstream".to_string(),
        CircuitBreakerConfig {
            failure_threshold,
            cooldown,
        },
    ))
}

pub fn snapshot(entries: Vec<(&str, Value)>) -> Arc<FallbackSnapshot> {
    let entries: BTreeMap<String, Value> = entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    Arc::new(FallbackSnapshot::from_entries("test.1", entries))
}
