//! Integration tests for the health and consistency monitors against a
//! stub upstream registry.

mod common;

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use registry_core::client::RegistryClient;
use registry_core::config::{MonitorSettings, UpstreamSettings};
use registry_core::constants::{CheckStatus, HealthStatus};
use registry_core::monitor::{ConsistencyMonitor, HealthMonitor};

use common::{breaker, cache_with_shared, snapshot};

fn client_for(base_url: &str) -> Arc<RegistryClient> {
    let settings = UpstreamSettings {
        base_url: base_url.to_string(),
        request_timeout_seconds: 2,
        ..Default::default()
    };
    Arc::new(RegistryClient::new(&settings).unwrap())
}

fn monitor_settings(drift_tolerance: f64) -> MonitorSettings {
    MonitorSettings {
        drift_tolerance,
        ..Default::default()
    }
}

#[tokio::test]
async fn drifted_numeric_field_fails_under_tight_tolerance() {
    let mut routes = HashMap::new();
    routes.insert("/agents/3".to_string(), json!({"floor": 10}));
    let (base_url, server) = common::spawn_stub_registry(routes).await;

    let fallback = snapshot(vec![("agent-3", json!({"floor": 1}))]);
    let monitor = ConsistencyMonitor::new(
        client_for(&base_url),
        fallback,
        &monitor_settings(0.2),
    );

    let result = monitor
        .check_consistency(&["agent-3".to_string()])
        .await;

    assert_eq!(result.summary.total, 1);
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.checks[0].status, CheckStatus::Fail);
    assert!(result.checks[0].message.contains("floor"));

    server.abort();
}

#[tokio::test]
async fn drifted_numeric_field_warns_under_loose_tolerance() {
    let mut routes = HashMap::new();
    routes.insert("/agents/3".to_string(), json!({"floor": 10}));
    let (base_url, server) = common::spawn_stub_registry(routes).await;

    let fallback = snapshot(vec![("agent-3", json!({"floor": 1}))]);
    let monitor = ConsistencyMonitor::new(
        client_for(&base_url),
        fallback,
        &monitor_settings(0.95),
    );

    let result = monitor
        .check_consistency(&["agent-3".to_string()])
        .await;

    assert_eq!(result.summary.warnings, 1);
    assert_eq!(result.checks[0].status, CheckStatus::Warning);

    server.abort();
}

#[tokio::test]
async fn identical_records_pass_and_mixed_samples_are_summarized() {
    let mut routes = HashMap::new();
    routes.insert("/agents/1".to_string(), json!({"id": "agent-1", "floor": 5}));
    routes.insert("/agents/2".to_string(), json!({"id": "agent-2", "floor": 50}));
    let (base_url, server) = common::spawn_stub_registry(routes).await;

    let fallback = snapshot(vec![
        ("agent-1", json!({"id": "agent-1", "floor": 5})),
        ("agent-2", json!({"id": "agent-2", "floor": 5})),
        ("agent-9", json!({"id": "agent-9"})),
    ]);
    let monitor = ConsistencyMonitor::new(
        client_for(&base_url),
        fallback,
        &monitor_settings(0.2),
    );

    let result = monitor
        .check_consistency(&[
            "agent-1".to_string(),
            "agent-2".to_string(),
            "agent-9".to_string(),
        ])
        .await;

    assert_eq!(result.summary.total, 3);
    assert_eq!(result.summary.passed, 1);
    // agent-2 drifted beyond tolerance; agent-9 got a 404 from the stub
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.summary.warnings, 1);

    assert!(monitor.latest().is_some());

    server.abort();
}

#[tokio::test]
async fn key_missing_from_snapshot_fails() {
    let (base_url, server) = common::spawn_stub_registry(HashMap::new()).await;

    let fallback = snapshot(vec![]);
    let monitor = ConsistencyMonitor::new(
        client_for(&base_url),
        fallback,
        &monitor_settings(0.2),
    );

    let result = monitor
        .check_consistency(&["agent-1".to_string()])
        .await;

    assert_eq!(result.checks[0].status, CheckStatus::Fail);
    assert!(result.checks[0].message.contains("no fallback snapshot entry"));

    server.abort();
}

#[tokio::test]
async fn unreachable_upstream_is_a_warning_not_a_failure() {
    // Port 1 refuses connections immediately
    let fallback = snapshot(vec![("agent-1", json!({"floor": 1}))]);
    let monitor = ConsistencyMonitor::new(
        client_for("http://127.0.0.1:1"),
        fallback,
        &monitor_settings(0.2),
    );

    let result = monitor
        .check_consistency(&["agent-1".to_string()])
        .await;

    assert_eq!(result.checks[0].status, CheckStatus::Warning);
    assert!(result.checks[0].message.contains("live fetch failed"));
}

#[tokio::test]
async fn consistency_runs_never_touch_cache_or_breaker_state() {
    let mut routes = HashMap::new();
    routes.insert("/agents/1".to_string(), json!({"floor": 1}));
    let (base_url, server) = common::spawn_stub_registry(routes).await;

    let (_, cache) = cache_with_shared();
    let circuit = breaker(5, Duration::from_secs(30));
    let fallback = snapshot(vec![("agent-1", json!({"floor": 1}))]);

    let monitor = ConsistencyMonitor::new(
        client_for(&base_url),
        Arc::clone(&fallback),
        &monitor_settings(0.2),
    );
    let _ = monitor.check_consistency(&["agent-1".to_string()]).await;

    assert_eq!(cache.fallback_len(), 0);
    assert_eq!(cache.stats().hits + cache.stats().misses, 0);
    assert_eq!(circuit.metrics().await.total_calls, 0);

    server.abort();
}

#[tokio::test]
async fn health_report_records_upstream_reachability() {
    let mut routes = HashMap::new();
    routes.insert("/health".to_string(), json!({"status": "ok"}));
    let (base_url, server) = common::spawn_stub_registry(routes).await;

    let (_, cache) = cache_with_shared();
    let circuit = breaker(5, Duration::from_secs(30));
    let fallback = snapshot(vec![("agent-1", json!({"floor": 1}))]);

    let monitor = HealthMonitor::new(
        cache,
        circuit,
        fallback,
        Some(client_for(&base_url)),
        &MonitorSettings::default(),
    );

    let report = monitor.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.upstream_reachable, Some(true));
    assert!(report.cache.upstream_cache_reachable);

    server.abort();
}

#[tokio::test]
async fn health_report_serializes_for_the_admin_endpoint() {
    let (_, cache) = cache_with_shared();
    let circuit = breaker(5, Duration::from_secs(30));
    let fallback = snapshot(vec![("agent-1", json!({"floor": 1}))]);

    let monitor = HealthMonitor::new(cache, circuit, fallback, None, &MonitorSettings::default());
    let report = monitor.health_check().await;

    let body = serde_json::to_value(&report).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["circuit_breaker"]["state"], "closed");
    assert!(body["cache"]["fallback_entry_count"].is_number());
}
