//! Consistency checking against the fallback snapshot
//!
//! Fetches live records directly from the upstream (bypassing cache and
//! breaker) and diffs them field-by-field against the bundled snapshot.
//! Numeric fields may drift within a configured relative tolerance
//! before a warning escalates to a failure; structural differences are
//! always failures.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::client::RegistryClient;
use crate::config::MonitorSettings;
use crate::constants::CheckStatus;
use crate::gateway::FallbackSnapshot;
use crate::logging::log_monitor_operation;

/// Result of diffing one sample key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

/// Aggregate counts across one monitor run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsistencySummary {
    pub total: usize,
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
}

/// Snapshot of one monitor run; consumers read the latest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyCheckResult {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<ConsistencyCheck>,
    pub summary: ConsistencySummary,
}

/// Diffs live records against the fallback snapshot
pub struct ConsistencyMonitor {
    client: Arc<RegistryClient>,
    fallback: Arc<FallbackSnapshot>,
    drift_tolerance: f64,
    sample_keys: Vec<String>,
    latest: RwLock<Option<ConsistencyCheckResult>>,
}

impl ConsistencyMonitor {
    pub fn new(
        client: Arc<RegistryClient>,
        fallback: Arc<FallbackSnapshot>,
        settings: &MonitorSettings,
    ) -> Self {
        let sample_keys = if settings.sample_keys.is_empty() {
            fallback.keys().map(str::to_string).collect()
        } else {
            settings.sample_keys.clone()
        };

        Self {
            client,
            fallback,
            drift_tolerance: settings.drift_tolerance,
            sample_keys,
            latest: RwLock::new(None),
        }
    }

    /// Diff each sample key's live record against the snapshot
    pub async fn check_consistency(&self, sample_keys: &[String]) -> ConsistencyCheckResult {
        let mut checks = Vec::with_capacity(sample_keys.len());
        for key in sample_keys {
            checks.push(self.check_key(key).await);
        }

        let mut summary = ConsistencySummary {
            total: checks.len(),
            ..Default::default()
        };
        for check in &checks {
            match check.status {
                CheckStatus::Pass => summary.passed += 1,
                CheckStatus::Warning => summary.warnings += 1,
                CheckStatus::Fail => summary.failed += 1,
            }
        }

        let result = ConsistencyCheckResult {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            checks,
            summary,
        };

        log_monitor_operation(
            "check_consistency",
            if result.summary.failed > 0 {
                "fail"
            } else if result.summary.warnings > 0 {
                "warning"
            } else {
                "pass"
            },
            Some(result.summary.total),
            Some(result.summary.failed),
            None,
        );

        *self.latest.write() = Some(result.clone());
        result
    }

    /// Run over the configured canonical sample set
    pub async fn check_configured_sample(&self) -> ConsistencyCheckResult {
        let keys = self.sample_keys.clone();
        self.check_consistency(&keys).await
    }

    /// Most recent result, if any run has completed
    pub fn latest(&self) -> Option<ConsistencyCheckResult> {
        self.latest.read().clone()
    }

    async fn check_key(&self, key: &str) -> ConsistencyCheck {
        let Some(snapshot_value) = self.fallback.get(key) else {
            return ConsistencyCheck {
                name: key.to_string(),
                status: CheckStatus::Fail,
                message: "no fallback snapshot entry".to_string(),
            };
        };

        // Live read goes straight through the client: it must bypass the
        // cache and must not touch breaker state.
        match self.client.fetch_by_key(key).await {
            Ok(live) => {
                let (status, message) =
                    compare_entry(&live, snapshot_value, self.drift_tolerance);
                ConsistencyCheck {
                    name: key.to_string(),
                    status,
                    message,
                }
            }
            Err(e) => ConsistencyCheck {
                name: key.to_string(),
                status: CheckStatus::Warning,
                message: format!("live fetch failed, snapshot not compared: {e}"),
            },
        }
    }

    /// Spawn the periodic consistency run over the configured sample
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = monitor.check_configured_sample().await;
            }
        })
    }
}

/// Compare a live record against its snapshot counterpart.
/// Pass: identical. Warning: content drift within tolerance. Fail:
/// structural mismatch or drift beyond tolerance.
pub fn compare_entry(live: &Value, snapshot: &Value, tolerance: f64) -> (CheckStatus, String) {
    if live == snapshot {
        return (CheckStatus::Pass, "identical".to_string());
    }

    let mut worst = CheckStatus::Pass;
    let mut messages = Vec::new();
    diff_value("", live, snapshot, tolerance, &mut worst, &mut messages);

    let message = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "records differ".to_string());
    let message = if messages.len() > 1 {
        format!("{message} (+{} more)", messages.len() - 1)
    } else {
        message
    };

    (worst, message)
}

fn escalate(worst: &mut CheckStatus, status: CheckStatus) {
    let rank = |s: CheckStatus| match s {
        CheckStatus::Pass => 0,
        CheckStatus::Warning => 1,
        CheckStatus::Fail => 2,
    };
    if rank(status) > rank(*worst) {
        *worst = status;
    }
}

fn diff_value(
    path: &str,
    live: &Value,
    snapshot: &Value,
    tolerance: f64,
    worst: &mut CheckStatus,
    messages: &mut Vec<String>,
) {
    if live == snapshot {
        return;
    }

    let label = if path.is_empty() { "record" } else { path };

    match (live, snapshot) {
        (Value::Object(live_map), Value::Object(snapshot_map)) => {
            let mut keys: Vec<&String> = live_map.keys().chain(snapshot_map.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match (live_map.get(key), snapshot_map.get(key)) {
                    (Some(live_child), Some(snapshot_child)) => diff_value(
                        &child_path,
                        live_child,
                        snapshot_child,
                        tolerance,
                        worst,
                        messages,
                    ),
                    (Some(_), None) => {
                        escalate(worst, CheckStatus::Fail);
                        messages.push(format!(
                            "field '{child_path}' missing from fallback snapshot"
                        ));
                    }
                    (None, Some(_)) => {
                        escalate(worst, CheckStatus::Fail);
                        messages
                            .push(format!("field '{child_path}' missing from live record"));
                    }
                    (None, None) => unreachable!(),
                }
            }
        }
        (Value::Number(live_num), Value::Number(snapshot_num)) => {
            let live_f = live_num.as_f64().unwrap_or(0.0);
            let snapshot_f = snapshot_num.as_f64().unwrap_or(0.0);
            let drift = (live_f - snapshot_f).abs() / live_f.abs().max(f64::EPSILON);
            if drift <= tolerance {
                escalate(worst, CheckStatus::Warning);
                messages.push(format!(
                    "field '{label}' drifted {:.1}% (live {live_num}, fallback {snapshot_num})",
                    drift * 100.0
                ));
            } else {
                escalate(worst, CheckStatus::Fail);
                messages.push(format!(
                    "field '{label}' drifted {:.1}% beyond tolerance (live {live_num}, fallback {snapshot_num})",
                    drift * 100.0
                ));
            }
        }
        (Value::Array(live_items), Value::Array(snapshot_items)) => {
            if live_items.len() != snapshot_items.len() {
                let live_len = live_items.len() as f64;
                let drift = (live_len - snapshot_items.len() as f64).abs() / live_len.max(1.0);
                let status = if drift <= tolerance {
                    CheckStatus::Warning
                } else {
                    CheckStatus::Fail
                };
                escalate(worst, status);
                messages.push(format!(
                    "field '{label}' length differs (live {}, fallback {})",
                    live_items.len(),
                    snapshot_items.len()
                ));
            } else {
                for (index, (live_item, snapshot_item)) in
                    live_items.iter().zip(snapshot_items).enumerate()
                {
                    diff_value(
                        &format!("{label}[{index}]"),
                        live_item,
                        snapshot_item,
                        tolerance,
                        worst,
                        messages,
                    );
                }
            }
        }
        (Value::String(_), Value::String(_)) | (Value::Bool(_), Value::Bool(_)) => {
            escalate(worst, CheckStatus::Warning);
            messages.push(format!("field '{label}' content differs"));
        }
        _ => {
            escalate(worst, CheckStatus::Fail);
            messages.push(format!("field '{label}' type mismatch"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_records_pass() {
        let value = json!({"id": "agent-1", "floor": 10});
        let (status, message) = compare_entry(&value, &value.clone(), 0.2);
        assert_eq!(status, CheckStatus::Pass);
        assert_eq!(message, "identical");
    }

    #[test]
    fn test_numeric_drift_within_tolerance_warns() {
        let live = json!({"floor": 10});
        let snapshot = json!({"floor": 9});
        let (status, message) = compare_entry(&live, &snapshot, 0.2);
        assert_eq!(status, CheckStatus::Warning);
        assert!(message.contains("floor"));
    }

    #[test]
    fn test_numeric_drift_beyond_tolerance_fails() {
        let live = json!({"floor": 10});
        let snapshot = json!({"floor": 1});
        let (status, message) = compare_entry(&live, &snapshot, 0.2);
        assert_eq!(status, CheckStatus::Fail);
        assert!(message.contains("beyond tolerance"));
    }

    #[test]
    fn test_missing_field_fails() {
        let live = json!({"id": "agent-1", "floor": 10});
        let snapshot = json!({"id": "agent-1"});
        let (status, message) = compare_entry(&live, &snapshot, 0.2);
        assert_eq!(status, CheckStatus::Fail);
        assert!(message.contains("missing from fallback snapshot"));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let live = json!({"floor": 10});
        let snapshot = json!({"floor": "ten"});
        let (status, _) = compare_entry(&live, &snapshot, 0.2);
        assert_eq!(status, CheckStatus::Fail);
    }

    #[test]
    fn test_string_drift_warns() {
        let live = json!({"bio": "updated bio"});
        let snapshot = json!({"bio": "old bio"});
        let (status, _) = compare_entry(&live, &snapshot, 0.2);
        assert_eq!(status, CheckStatus::Warning);
    }

    #[test]
    fn test_worst_status_wins() {
        let live = json!({"bio": "updated", "floor": 100});
        let snapshot = json!({"bio": "old", "floor": 1});
        let (status, _) = compare_entry(&live, &snapshot, 0.2);
        assert_eq!(status, CheckStatus::Fail);
    }

    #[test]
    fn test_nested_object_drift() {
        let live = json!({"stats": {"followers": 5400}});
        let snapshot = json!({"stats": {"followers": 5000}});
        let (status, message) = compare_entry(&live, &snapshot, 0.2);
        assert_eq!(status, CheckStatus::Warning);
        assert!(message.contains("stats.followers"));
    }
}
