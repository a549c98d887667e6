//! Feedback ledger: append-only post-mortem history.
//!
//! The ledger aggregates pass/fail outcomes per (agent, action type) and
//! derives corrections and aggregate health from them. It is advisory: a
//! failed save is logged and tolerated, unlike the approval stores.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// Entries retained in the persisted trailing window. The in-memory copy may
/// hold more during a process lifetime.
const PERSISTED_WINDOW: usize = 100;

/// Entries considered for aggregate health.
const HEALTH_WINDOW: usize = 50;

/// Recorded outcome of one completed task. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMortem {
    pub action_id: String,
    pub agent: String,
    pub action_type: String,
    pub outcome: String,
    pub success: bool,
    pub lessons: Vec<String>,
    pub corrections: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Default)]
struct LedgerDocument {
    post_mortems: Vec<PostMortem>,
}

/// Per-agent aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStats {
    pub agent: String,
    pub total_actions: usize,
    pub success_rate: Option<f64>,
    pub recent_failures: usize,
}

/// Aggregate health derived from recent outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    /// excellent / good / fair / needs_attention, or unknown when empty.
    pub health: String,
    pub total_actions: usize,
    pub recent_success_rate: Option<f64>,
    pub pending_corrections: usize,
}

/// Append-only history of task outcomes.
pub struct FeedbackLedger {
    path: PathBuf,
    post_mortems: RwLock<Vec<PostMortem>>,
}

impl FeedbackLedger {
    /// Open the ledger backed by `path`; missing or corrupt history starts
    /// empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let post_mortems = load_document(&path);
        Self {
            path,
            post_mortems: RwLock::new(post_mortems),
        }
    }

    /// Record one outcome and derive lessons/corrections from history.
    ///
    /// On failure: a third failure for the same (agent, action type) pair
    /// appends a repeated-failure correction, and a context friction score
    /// below 0.7 appends a tighten-thresholds correction.
    pub async fn record_outcome(
        &self,
        action_id: &str,
        agent: &str,
        action_type: &str,
        outcome: &str,
        success: bool,
        context: Option<&Value>,
    ) -> PostMortem {
        let mut lessons = Vec::new();
        let mut corrections = Vec::new();

        let mut post_mortems = self.post_mortems.write().await;

        if success {
            lessons.push(format!("Successful {action_type} execution by {agent}"));
        } else {
            lessons.push(format!(
                "Action {action_type} by {agent} failed with outcome: {outcome}"
            ));

            let similar_failures = post_mortems
                .iter()
                .filter(|pm| pm.agent == agent && pm.action_type == action_type && !pm.success)
                .count();
            if similar_failures >= 2 {
                corrections.push(format!(
                    "Pattern detected: {agent} has repeated failures on {action_type}"
                ));
                corrections
                    .push("Recommend: increase oversight scrutiny for this action type".to_string());
            }

            let friction = context
                .and_then(|c| c.get("friction_score"))
                .and_then(|f| f.as_f64())
                .unwrap_or(1.0);
            if friction < 0.7 {
                corrections.push(
                    "Low friction score correlated with failure - tighten thresholds".to_string(),
                );
            }
        }

        let post_mortem = PostMortem {
            action_id: action_id.to_string(),
            agent: agent.to_string(),
            action_type: action_type.to_string(),
            outcome: outcome.to_string(),
            success,
            lessons,
            corrections,
            timestamp: Utc::now(),
        };

        post_mortems.push(post_mortem.clone());
        persist(&self.path, &post_mortems);

        post_mortem
    }

    /// Recommendations aggregated from history matching the agent or action
    /// type. A single default recommendation when there is no history.
    pub async fn recommendations(&self, agent: &str, action_type: &str) -> Vec<String> {
        let post_mortems = self.post_mortems.read().await;
        let relevant: Vec<&PostMortem> = post_mortems
            .iter()
            .filter(|pm| pm.agent == agent || pm.action_type == action_type)
            .collect();

        if relevant.is_empty() {
            return vec!["No historical data - proceed with standard protocols".to_string()];
        }

        let mut recommendations = Vec::new();

        let successes = relevant.iter().filter(|pm| pm.success).count();
        let success_rate = successes as f64 / relevant.len() as f64;
        if success_rate < 0.7 {
            recommendations.push(format!(
                "Warning: historical success rate is {:.0}%",
                success_rate * 100.0
            ));
        }

        let recent_failures = relevant
            .iter()
            .rev()
            .take(10)
            .filter(|pm| !pm.success)
            .collect::<Vec<_>>();
        for pm in recent_failures.into_iter().rev() {
            for correction in &pm.corrections {
                if !recommendations.contains(correction) {
                    recommendations.push(correction.clone());
                }
            }
        }

        if recommendations.is_empty() {
            recommendations.push("No specific recommendations - proceed normally".to_string());
        }
        recommendations
    }

    /// Aggregate stats for one agent.
    pub async fn agent_stats(&self, agent: &str) -> AgentStats {
        let post_mortems = self.post_mortems.read().await;
        let agent_actions: Vec<&PostMortem> =
            post_mortems.iter().filter(|pm| pm.agent == agent).collect();

        if agent_actions.is_empty() {
            return AgentStats {
                agent: agent.to_string(),
                total_actions: 0,
                success_rate: None,
                recent_failures: 0,
            };
        }

        let successes = agent_actions.iter().filter(|pm| pm.success).count();
        let recent_failures = agent_actions
            .iter()
            .rev()
            .take(10)
            .filter(|pm| !pm.success)
            .count();

        AgentStats {
            agent: agent.to_string(),
            total_actions: agent_actions.len(),
            success_rate: Some(successes as f64 / agent_actions.len() as f64),
            recent_failures,
        }
    }

    /// Health over the most recent window: excellent >= 0.9, good >= 0.75,
    /// fair >= 0.6, needs_attention below; unknown with no history.
    pub async fn system_health(&self) -> SystemHealth {
        let post_mortems = self.post_mortems.read().await;
        if post_mortems.is_empty() {
            return SystemHealth {
                health: "unknown".to_string(),
                total_actions: 0,
                recent_success_rate: None,
                pending_corrections: 0,
            };
        }

        let start = post_mortems.len().saturating_sub(HEALTH_WINDOW);
        let recent = &post_mortems[start..];
        let successes = recent.iter().filter(|pm| pm.success).count();
        let success_rate = successes as f64 / recent.len() as f64;

        let health = if success_rate >= 0.9 {
            "excellent"
        } else if success_rate >= 0.75 {
            "good"
        } else if success_rate >= 0.6 {
            "fair"
        } else {
            "needs_attention"
        };

        SystemHealth {
            health: health.to_string(),
            total_actions: post_mortems.len(),
            recent_success_rate: Some(success_rate),
            pending_corrections: recent.iter().filter(|pm| !pm.corrections.is_empty()).count(),
        }
    }

    /// Number of recorded entries currently in memory.
    pub async fn len(&self) -> usize {
        self.post_mortems.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.post_mortems.read().await.is_empty()
    }
}

fn load_document(path: &Path) -> Vec<PostMortem> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<LedgerDocument>(&raw) {
            Ok(doc) => doc.post_mortems,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt feedback ledger, starting empty");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}

fn persist(path: &Path, post_mortems: &[PostMortem]) {
    let start = post_mortems.len().saturating_sub(PERSISTED_WINDOW);
    let doc = LedgerDocument {
        post_mortems: post_mortems[start..].to_vec(),
    };

    let result = (|| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string(&doc)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, raw)
    })();

    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "failed to persist feedback ledger");
    }
}
