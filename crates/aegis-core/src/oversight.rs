//! Oversight reviewer: the hierarchical supervisor over all worker agents.
//!
//! Every proposed agent action passes through a fixed-precedence review:
//! directive compliance, then the keyword standard, then friction scoring.
//! The first failing check wins and short-circuits the rest. Verdicts are
//! appended to mutually exclusive approved/rejected ledgers and every step
//! emits telemetry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::compliance::{check_standard, score_friction};
use crate::config::GovernanceConfig;
use crate::directives::{Directive, DirectiveRegistry};
use crate::telemetry::TelemetryBus;

/// Worker-agent roles the reviewer can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentRole {
    Research,
    Analysis,
    Build,
    Outreach,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Research => "Research",
            AgentRole::Analysis => "Analysis",
            AgentRole::Build => "Build",
            AgentRole::Outreach => "Outreach",
        }
    }
}

/// Verdict on one reviewed action. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent_name: String,
    pub action: String,
    pub result: Value,
    pub approved: bool,
    pub friction_score: f64,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

/// Counts and rate reported by [`OversightReviewer::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OversightStatus {
    pub approved_count: usize,
    pub rejected_count: usize,
    pub approval_rate: f64,
    pub active_directives: usize,
    pub last_review: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct ReviewLedger {
    approved: Vec<AgentReport>,
    rejected: Vec<AgentReport>,
}

const REVIEWER_PROMPT: &str = "You are the oversight reviewer. You supervise all worker \
agents (Research, Analysis, Build, Outreach) and ensure every output meets the firm's \
standard. You review all products, content, and communications before they reach the \
operator for final authorization.";

/// Gates every externally visible agent action.
pub struct OversightReviewer {
    config: Arc<GovernanceConfig>,
    directives: Arc<DirectiveRegistry>,
    telemetry: Arc<TelemetryBus>,
    ledger: RwLock<ReviewLedger>,
}

impl OversightReviewer {
    pub fn new(
        config: Arc<GovernanceConfig>,
        directives: Arc<DirectiveRegistry>,
        telemetry: Arc<TelemetryBus>,
    ) -> Self {
        Self {
            config,
            directives,
            telemetry,
            ledger: RwLock::new(ReviewLedger::default()),
        }
    }

    /// Reviewer persona extended with the active directive block, used to
    /// bias any reviewer-side LLM prompting.
    pub async fn prompt_with_directives(&self) -> String {
        let fragment = self.directives.prompt_fragment().await;
        if fragment.is_empty() {
            REVIEWER_PROMPT.to_string()
        } else {
            format!("{REVIEWER_PROMPT}\n\n{fragment}")
        }
    }

    /// Review one proposed action. Precedence: directive violation, then
    /// standard violation, then friction below threshold; otherwise approve.
    pub async fn review_action(&self, agent_name: &str, action: &str, data: &Value) -> AgentReport {
        self.telemetry
            .publish(
                "oversight",
                json!({
                    "type": "thought",
                    "message": format!("Initiating review of {agent_name} action: {action}"),
                    "phase": "review_start",
                }),
            )
            .await;

        let active_directives = self.directives.list_active().await;
        if !active_directives.is_empty() {
            self.telemetry
                .publish(
                    "oversight",
                    json!({
                        "type": "thought",
                        "message": format!(
                            "Applying {} operator directive(s) to review",
                            active_directives.len()
                        ),
                        "phase": "directive_check",
                    }),
                )
                .await;
        }

        self.telemetry
            .publish(
                "oversight",
                json!({
                    "type": "review_started",
                    "agent": agent_name,
                    "action": action,
                    "active_directives": active_directives.len(),
                }),
            )
            .await;

        let action_text = data.to_string();

        self.telemetry
            .publish(
                "oversight",
                json!({
                    "type": "tool_call",
                    "tool": "check_standard",
                    "args": {"action_length": action_text.len()},
                }),
            )
            .await;
        let standard = check_standard(&self.config, &action_text);

        self.telemetry
            .publish(
                "oversight",
                json!({
                    "type": "tool_call",
                    "tool": "score_friction",
                    "args": {
                        "data_keys": data
                            .as_object()
                            .map(|o| o.keys().cloned().collect::<Vec<_>>())
                            .unwrap_or_default(),
                    },
                }),
            )
            .await;
        let friction = score_friction(&self.config, data);

        let mut report = AgentReport {
            agent_name: agent_name.to_string(),
            action: action.to_string(),
            result: data.clone(),
            approved: false,
            friction_score: friction.score,
            notes: String::new(),
            timestamp: Utc::now(),
        };

        if let Some(violation) = directive_violation(&action_text, &active_directives) {
            report.notes = format!("Operator directive violation: {violation}");
            self.record_rejection(&report).await;
        } else if !standard.passed {
            report.notes = format!("Standard violation: {:?}", standard.violations);
            self.record_rejection(&report).await;
        } else if friction.score < self.config.friction_threshold {
            report.notes = format!(
                "Friction score {:.2} below threshold {}",
                friction.score, self.config.friction_threshold
            );
            self.record_rejection(&report).await;
        } else {
            report.approved = true;
            report.notes = "Action approved by oversight".to_string();

            self.telemetry
                .publish(
                    "oversight",
                    json!({
                        "type": "thought",
                        "message": format!(
                            "Action approved with friction score {:.2}",
                            report.friction_score
                        ),
                        "phase": "approval",
                    }),
                )
                .await;
            self.telemetry
                .publish(
                    "oversight",
                    json!({
                        "type": "action_approved",
                        "agent": report.agent_name,
                        "action": report.action,
                        "friction_score": report.friction_score,
                    }),
                )
                .await;

            let mut ledger = self.ledger.write().await;
            ledger.approved.push(report.clone());
        }

        tracing::info!(
            agent = %report.agent_name,
            action = %report.action,
            approved = report.approved,
            friction = report.friction_score,
            "review complete"
        );
        report
    }

    async fn record_rejection(&self, report: &AgentReport) {
        self.telemetry
            .publish(
                "oversight",
                json!({
                    "type": "action_rejected",
                    "agent": report.agent_name,
                    "action": report.action,
                    "reason": report.notes,
                    "friction_score": report.friction_score,
                }),
            )
            .await;

        let mut ledger = self.ledger.write().await;
        ledger.rejected.push(report.clone());
    }

    /// Route a task type to the responsible worker role. Unknown types fall
    /// back to research.
    pub async fn delegate(&self, task_type: &str, parameters: &Value) -> AgentRole {
        self.telemetry
            .publish(
                "oversight",
                json!({
                    "type": "task_delegated",
                    "task_type": task_type,
                    "parameters": parameters,
                }),
            )
            .await;

        let role = match task_type {
            "analysis" => AgentRole::Analysis,
            "infrastructure" => AgentRole::Build,
            "communication" => AgentRole::Outreach,
            _ => AgentRole::Research,
        };

        self.telemetry
            .publish(
                "oversight",
                json!({
                    "type": "thought",
                    "message": format!("Delegating to {} agent", role.as_str()),
                    "phase": "delegation_complete",
                }),
            )
            .await;
        role
    }

    /// Current counts, approval rate, and directive pressure.
    pub async fn status(&self) -> OversightStatus {
        let ledger = self.ledger.read().await;
        let approved = ledger.approved.len();
        let rejected = ledger.rejected.len();

        let last_review = ledger
            .approved
            .iter()
            .chain(ledger.rejected.iter())
            .map(|r| r.timestamp)
            .max();

        OversightStatus {
            approved_count: approved,
            rejected_count: rejected,
            approval_rate: approved as f64 / (approved + rejected).max(1) as f64,
            active_directives: self.directives.list_active().await.len(),
            last_review,
        }
    }
}

/// A directive phrased as a prohibition ("avoid ..." / "do not ...") is
/// violated when any remaining word longer than three characters appears in
/// the serialized action payload, case-insensitively.
fn directive_violation(action_text: &str, directives: &[Directive]) -> Option<String> {
    let action_lower = action_text.to_lowercase();

    for directive in directives {
        let content_lower = directive.content.to_lowercase();
        if !content_lower.contains("avoid") && !content_lower.contains("do not") {
            continue;
        }

        let stripped = content_lower.replace("avoid", "").replace("do not", "");
        for keyword in stripped.split_whitespace() {
            if keyword.len() > 3 && action_lower.contains(keyword) {
                return Some(format!(
                    "contains '{keyword}' which conflicts with directive: {}",
                    directive.content
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::Priority;

    fn reviewer_with(dir: &tempfile::TempDir) -> OversightReviewer {
        let config = Arc::new(GovernanceConfig::default());
        let directives = Arc::new(DirectiveRegistry::open(dir.path().join("directives.json")));
        let telemetry = Arc::new(TelemetryBus::new());
        OversightReviewer::new(config, directives, telemetry)
    }

    fn reviewer_parts(
        dir: &tempfile::TempDir,
    ) -> (Arc<DirectiveRegistry>, OversightReviewer) {
        let config = Arc::new(GovernanceConfig::default());
        let directives = Arc::new(DirectiveRegistry::open(dir.path().join("directives.json")));
        let telemetry = Arc::new(TelemetryBus::new());
        let reviewer =
            OversightReviewer::new(config, Arc::clone(&directives), telemetry);
        (directives, reviewer)
    }

    #[tokio::test]
    async fn test_clean_action_approved() {
        let dir = tempfile::tempdir().unwrap();
        let reviewer = reviewer_with(&dir);

        let report = reviewer
            .review_action(
                "Workflow",
                "investment_decision",
                &json!({"amount": 50_000, "risk_level": "low"}),
            )
            .await;

        assert!(report.approved);
        assert_eq!(report.friction_score, 1.0);

        let status = reviewer.status().await;
        assert_eq!(status.approved_count, 1);
        assert_eq!(status.rejected_count, 0);
        assert_eq!(status.approval_rate, 1.0);
        assert!(status.last_review.is_some());
    }

    #[tokio::test]
    async fn test_friction_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let reviewer = reviewer_with(&dir);

        let report = reviewer
            .review_action(
                "Workflow",
                "investment_decision",
                &json!({"amount": 2_000_000, "risk_level": "high", "leverage": 3.0}),
            )
            .await;

        assert!(!report.approved);
        assert_eq!(report.friction_score, 0.35);
        assert!(report.notes.contains("below threshold"));
    }

    #[tokio::test]
    async fn test_standard_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let reviewer = reviewer_with(&dir);

        let report = reviewer
            .review_action(
                "Workflow",
                "investment_decision",
                &json!({"pitch": "guaranteed returns for everyone"}),
            )
            .await;

        assert!(!report.approved);
        assert!(report.notes.contains("Standard violation"));
    }

    #[tokio::test]
    async fn test_directive_violation_overrides_friction() {
        let dir = tempfile::tempdir().unwrap();
        let (directives, reviewer) = reviewer_parts(&dir);
        directives
            .add("do not mention crypto", Priority::High)
            .await
            .unwrap();

        // Friction alone would approve this payload.
        let report = reviewer
            .review_action(
                "Workflow",
                "investment_decision",
                &json!({"amount": 10_000, "asset_note": "allocate to crypto index"}),
            )
            .await;

        assert!(!report.approved);
        assert!(report.notes.contains("directive violation"));
        assert!(report.notes.contains("crypto"));
    }

    #[tokio::test]
    async fn test_directive_precedence_over_standard() {
        let dir = tempfile::tempdir().unwrap();
        let (directives, reviewer) = reviewer_parts(&dir);
        directives
            .add("avoid moonshot language", Priority::High)
            .await
            .unwrap();

        // Payload violates both the directive and the standard; the
        // directive reason must win.
        let report = reviewer
            .review_action(
                "Workflow",
                "investment_decision",
                &json!({"pitch": "a moonshot with guaranteed returns"}),
            )
            .await;

        assert!(!report.approved);
        assert!(report.notes.contains("directive violation"));
    }

    #[tokio::test]
    async fn test_deactivated_directive_not_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let (directives, reviewer) = reviewer_parts(&dir);
        let d = directives
            .add("do not mention crypto", Priority::High)
            .await
            .unwrap();
        directives.deactivate(&d.id).await.unwrap();

        let report = reviewer
            .review_action("Workflow", "decision", &json!({"note": "crypto exposure"}))
            .await;
        assert!(report.approved);
    }

    #[tokio::test]
    async fn test_delegation_map() {
        let dir = tempfile::tempdir().unwrap();
        let reviewer = reviewer_with(&dir);
        let params = json!({});

        assert_eq!(reviewer.delegate("research", &params).await, AgentRole::Research);
        assert_eq!(reviewer.delegate("analysis", &params).await, AgentRole::Analysis);
        assert_eq!(reviewer.delegate("infrastructure", &params).await, AgentRole::Build);
        assert_eq!(reviewer.delegate("communication", &params).await, AgentRole::Outreach);
        assert_eq!(reviewer.delegate("unknown", &params).await, AgentRole::Research);
    }

    #[tokio::test]
    async fn test_prompt_with_directives() {
        let dir = tempfile::tempdir().unwrap();
        let (directives, reviewer) = reviewer_parts(&dir);

        let bare = reviewer.prompt_with_directives().await;
        assert!(!bare.contains("[OPERATOR DIRECTIVES"));

        directives
            .add("favor fixed income", Priority::Normal)
            .await
            .unwrap();
        let extended = reviewer.prompt_with_directives().await;
        assert!(extended.contains("[OPERATOR DIRECTIVES"));
        assert!(extended.contains("favor fixed income"));
    }

    #[tokio::test]
    async fn test_approval_rate_zero_reviews() {
        let dir = tempfile::tempdir().unwrap();
        let reviewer = reviewer_with(&dir);
        let status = reviewer.status().await;
        // Guarded denominator: no division by zero, rate reads as 0/1.
        assert_eq!(status.approval_rate, 0.0);
    }
}
