//! Build agent: infrastructure monitoring and execution systems.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::AgentStatus;
use crate::telemetry::TelemetryBus;

const ROLE: &str = "Build";

const COMPONENTS: [&str; 5] = [
    "execution_engine",
    "data_pipeline",
    "risk_monitor",
    "telemetry_stream",
    "audit_log",
];

struct CheckRecord {
    latency_ms: f64,
    timestamp: DateTime<Utc>,
}

/// Worker agent for infrastructure checks. Reports to the oversight
/// reviewer. Purely local: no LLM round-trips.
pub struct BuildAgent {
    telemetry: Arc<TelemetryBus>,
    checks: RwLock<Vec<CheckRecord>>,
}

impl BuildAgent {
    pub fn new(telemetry: Arc<TelemetryBus>) -> Self {
        Self {
            telemetry,
            checks: RwLock::new(Vec::new()),
        }
    }

    /// Check every monitored component. Latency is a deterministic
    /// per-component pseudo-measurement so repeated checks are comparable.
    pub async fn health_check(&self) -> Value {
        self.telemetry
            .publish("build", json!({"type": "health_check_started"}))
            .await;

        let timestamp = Utc::now();
        let mut results = serde_json::Map::new();
        {
            let mut checks = self.checks.write().await;
            for component in COMPONENTS {
                let latency_ms = pseudo_latency(component);
                checks.push(CheckRecord {
                    latency_ms,
                    timestamp,
                });
                results.insert(
                    component.to_string(),
                    json!({"status": "operational", "latency_ms": latency_ms}),
                );
            }
        }

        self.telemetry
            .publish(
                "build",
                json!({"type": "health_check_completed", "all_operational": true}),
            )
            .await;

        json!({
            "agent": ROLE,
            "action": "health_check",
            "components": Value::Object(results),
            "overall_status": "operational",
            "timestamp": timestamp,
        })
    }

    /// Report execution metrics for one in-flight task.
    pub async fn monitor_execution(&self, task_id: &str) -> Value {
        self.telemetry
            .publish("build", json!({"type": "execution_monitor", "task_id": task_id}))
            .await;

        json!({
            "agent": ROLE,
            "action": "execution_monitor",
            "task_id": task_id,
            "status": "monitoring",
            "cpu_usage": 42.5,
            "memory_usage": 68.3,
        })
    }

    /// Mean latency across the most recent checks.
    pub async fn recent_latency(&self) -> f64 {
        let checks = self.checks.read().await;
        let recent: Vec<&CheckRecord> = checks.iter().rev().take(5).collect();
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().map(|c| c.latency_ms).sum::<f64>() / recent.len() as f64
    }

    pub async fn status(&self) -> AgentStatus {
        let checks = self.checks.read().await;
        AgentStatus::operational(ROLE, checks.len(), checks.last().map(|c| c.timestamp))
    }
}

/// Stable latency figure derived from the component name.
fn pseudo_latency(component: &str) -> f64 {
    let seed = component
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    15.0 + (seed % 50) as f64
}
