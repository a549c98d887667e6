//! Workflow coordinator: the fixed governance pipeline for one task.
//!
//! Research and analysis feed a combined payload into oversight review.
//! Approval leads to a staged report, rejection ends the run, and the
//! finalize phase records a post-mortem on every path including errors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agents::{AnalysisAgent, BuildAgent, OutreachAgent, ResearchAgent};
use crate::feedback::FeedbackLedger;
use crate::oversight::OversightReviewer;
use crate::telemetry::TelemetryBus;

/// Phases of one workflow run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Initialize,
    Research,
    Analyze,
    SystemCheck,
    OversightReview,
    GenerateReport,
    Finalize,
    Complete,
    Rejected,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Initialize => "initialize",
            WorkflowPhase::Research => "research",
            WorkflowPhase::Analyze => "analyze",
            WorkflowPhase::SystemCheck => "system_check",
            WorkflowPhase::OversightReview => "oversight_review",
            WorkflowPhase::GenerateReport => "generate_report",
            WorkflowPhase::Finalize => "finalize",
            WorkflowPhase::Complete => "complete",
            WorkflowPhase::Rejected => "rejected",
        }
    }
}

/// Mutable per-run state, exclusively owned by one `execute` invocation.
/// Each phase writes its slice; the terminal phase summarizes it into a
/// [`WorkflowOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub task_id: String,
    pub task_type: String,
    pub parameters: Value,
    pub phase: WorkflowPhase,
    pub research: Value,
    pub analysis: Value,
    pub system_status: Value,
    pub report: Option<Value>,
    pub oversight_approval: bool,
    pub friction_score: f64,
    pub messages: Vec<String>,
}

impl WorkflowState {
    fn new(task_id: &str, task_type: &str, parameters: Value) -> Self {
        Self {
            task_id: task_id.to_string(),
            task_type: task_type.to_string(),
            parameters,
            phase: WorkflowPhase::Initialize,
            research: Value::Null,
            analysis: Value::Null,
            system_status: Value::Null,
            report: None,
            oversight_approval: false,
            friction_score: 0.0,
            messages: Vec::new(),
        }
    }
}

/// Final state of one workflow run. Rejection is a normal outcome, not an
/// error: `execute` never fails, it reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub task_id: String,
    pub status: WorkflowPhase,
    pub oversight_approval: bool,
    pub friction_score: f64,
    pub report: Option<Value>,
    pub messages: Vec<String>,
}

impl From<WorkflowState> for WorkflowOutcome {
    fn from(state: WorkflowState) -> Self {
        Self {
            task_id: state.task_id,
            status: state.phase,
            oversight_approval: state.oversight_approval,
            friction_score: state.friction_score,
            report: state.report,
            messages: state.messages,
        }
    }
}

/// Drives one task through the governance pipeline.
pub struct WorkflowCoordinator {
    oversight: Arc<OversightReviewer>,
    research: Arc<ResearchAgent>,
    analysis: Arc<AnalysisAgent>,
    build: Arc<BuildAgent>,
    outreach: Arc<OutreachAgent>,
    feedback: Arc<FeedbackLedger>,
    telemetry: Arc<TelemetryBus>,
}

impl WorkflowCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        oversight: Arc<OversightReviewer>,
        research: Arc<ResearchAgent>,
        analysis: Arc<AnalysisAgent>,
        build: Arc<BuildAgent>,
        outreach: Arc<OutreachAgent>,
        feedback: Arc<FeedbackLedger>,
        telemetry: Arc<TelemetryBus>,
    ) -> Self {
        Self {
            oversight,
            research,
            analysis,
            build,
            outreach,
            feedback,
            telemetry,
        }
    }

    /// Run one task end to end. Every run terminates in `Complete` or
    /// `Rejected` and leaves a post-mortem, even when a phase fails.
    pub async fn execute(&self, task_id: &str, task_type: &str, parameters: Value) -> WorkflowOutcome {
        self.telemetry
            .publish(
                "workflow",
                json!({"type": "workflow_started", "task_id": task_id, "task_type": task_type}),
            )
            .await;
        self.phase_started(task_id, WorkflowPhase::Initialize).await;
        let mut state = WorkflowState::new(task_id, task_type, parameters);

        // RESEARCH
        state.phase = WorkflowPhase::Research;
        self.phase_started(task_id, state.phase).await;
        let topic = state
            .parameters
            .get("topic")
            .and_then(|t| t.as_str())
            .unwrap_or(task_type)
            .to_string();
        match self.research.conduct_research(&topic, &state.parameters).await {
            Ok(output) => state.research = output,
            Err(e) => {
                let message = self.phase_error(task_id, state.phase, &e).await;
                state.messages.push(message);
            }
        }

        // ANALYZE
        state.phase = WorkflowPhase::Analyze;
        self.phase_started(task_id, state.phase).await;
        let holdings = state.parameters.get("holdings").cloned().unwrap_or(json!([]));
        let constraints = state.parameters.get("constraints").cloned().unwrap_or(json!({}));
        match self.analysis.optimize_portfolio(&holdings, &constraints).await {
            Ok(output) => state.analysis = output,
            Err(e) => {
                let message = self.phase_error(task_id, state.phase, &e).await;
                state.messages.push(message);
            }
        }

        // SYSTEM CHECK
        state.phase = WorkflowPhase::SystemCheck;
        self.phase_started(task_id, state.phase).await;
        state.system_status = self.build.health_check().await;
        if state.system_status["overall_status"] != "operational" {
            state.messages.push("infrastructure degraded during run".to_string());
        }

        // OVERSIGHT REVIEW over the combined picture.
        state.phase = WorkflowPhase::OversightReview;
        self.phase_started(task_id, state.phase).await;
        let combined = json!({
            "research": state.research,
            "analysis": state.analysis,
            "parameters": state.parameters,
        });
        let verdict = self
            .oversight
            .review_action("Workflow", "investment_decision", &combined)
            .await;
        state.oversight_approval = verdict.approved;
        state.friction_score = verdict.friction_score;
        state.messages.push(verdict.notes.clone());

        // GENERATE REPORT only on approval; the draft is staged for human
        // sign-off, never sent from here.
        if state.oversight_approval {
            state.phase = WorkflowPhase::GenerateReport;
            self.phase_started(task_id, state.phase).await;
            match self.outreach.generate_report(task_type, &combined).await {
                Ok(output) => state.report = Some(output),
                Err(e) => {
                    let message = self.phase_error(task_id, state.phase, &e).await;
                    state.messages.push(message);
                }
            }
        }

        // FINALIZE runs on every path so rejected and errored runs still
        // feed the ledger.
        state.phase = WorkflowPhase::Finalize;
        self.phase_started(task_id, state.phase).await;
        let outcome_label = if state.oversight_approval { "complete" } else { "rejected" };
        self.feedback
            .record_outcome(
                task_id,
                "Workflow",
                task_type,
                outcome_label,
                state.oversight_approval,
                Some(&json!({"friction_score": state.friction_score})),
            )
            .await;

        state.phase = if state.oversight_approval {
            WorkflowPhase::Complete
        } else {
            WorkflowPhase::Rejected
        };

        self.telemetry
            .publish(
                "workflow",
                json!({
                    "type": "workflow_completed",
                    "task_id": task_id,
                    "status": state.phase.as_str(),
                    "approved": state.oversight_approval,
                    "friction_score": state.friction_score,
                }),
            )
            .await;
        tracing::info!(
            task_id = %task_id,
            status = state.phase.as_str(),
            friction = state.friction_score,
            "workflow finished"
        );

        WorkflowOutcome::from(state)
    }

    async fn phase_started(&self, task_id: &str, phase: WorkflowPhase) {
        self.telemetry
            .publish(
                "workflow",
                json!({"type": "phase_started", "task_id": task_id, "phase": phase.as_str()}),
            )
            .await;
    }

    async fn phase_error(
        &self,
        task_id: &str,
        phase: WorkflowPhase,
        error: &crate::error::AegisError,
    ) -> String {
        let message = format!("phase {} failed: {error}", phase.as_str());
        tracing::warn!(task_id = %task_id, phase = phase.as_str(), error = %error, "workflow phase failed");
        self.telemetry
            .publish(
                "workflow",
                json!({
                    "type": "workflow_error",
                    "task_id": task_id,
                    "phase": phase.as_str(),
                    "error": error.to_string(),
                }),
            )
            .await;
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernanceConfig;
    use crate::directives::DirectiveRegistry;
    use crate::llm::{CannedModel, LanguageModel};
    use crate::notify::{notification_limit, NullNotifier};
    use crate::pending::PendingActionStore;

    fn coordinator(dir: &tempfile::TempDir) -> (WorkflowCoordinator, Arc<PendingActionStore>) {
        let config = Arc::new(GovernanceConfig::default());
        let telemetry = Arc::new(TelemetryBus::new());
        let llm: Arc<dyn LanguageModel> =
            Arc::new(CannedModel("steady risk-adjusted positioning"));
        let directives = Arc::new(DirectiveRegistry::open(dir.path().join("directives.json")));
        let pending = Arc::new(PendingActionStore::open(dir.path().join("pending.json")));
        let feedback = Arc::new(FeedbackLedger::open(dir.path().join("feedback.json")));

        let oversight = Arc::new(OversightReviewer::new(
            config,
            directives,
            Arc::clone(&telemetry),
        ));
        let research = Arc::new(ResearchAgent::new(
            Arc::clone(&llm),
            Arc::clone(&telemetry),
            1024,
        ));
        let analysis = Arc::new(AnalysisAgent::new(
            Arc::clone(&llm),
            Arc::clone(&telemetry),
            1024,
        ));
        let build = Arc::new(BuildAgent::new(Arc::clone(&telemetry)));
        let outreach = Arc::new(OutreachAgent::new(
            llm,
            Arc::clone(&telemetry),
            Arc::clone(&pending),
            Arc::new(NullNotifier),
            notification_limit(),
            1024,
        ));

        let coordinator = WorkflowCoordinator::new(
            oversight, research, analysis, build, outreach, feedback, telemetry,
        );
        (coordinator, pending)
    }

    #[tokio::test]
    async fn test_low_risk_task_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, pending) = coordinator(&dir);

        let outcome = coordinator
            .execute(
                "task-1",
                "quarterly",
                json!({"amount": 50_000, "risk_level": "low"}),
            )
            .await;

        assert_eq!(outcome.status, WorkflowPhase::Complete);
        assert!(outcome.oversight_approval);
        assert_eq!(outcome.friction_score, 1.0);

        let report = outcome.report.unwrap();
        assert_eq!(report["status"], "PENDING_APPROVAL");
        assert_eq!(pending.list_pending().await.len(), 1);
    }

    #[tokio::test]
    async fn test_high_risk_task_rejected_without_report() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, pending) = coordinator(&dir);

        let outcome = coordinator
            .execute(
                "task-2",
                "research",
                json!({"amount": 2_000_000, "risk_level": "high", "leverage": 3.0}),
            )
            .await;

        assert_eq!(outcome.status, WorkflowPhase::Rejected);
        assert!(!outcome.oversight_approval);
        assert_eq!(outcome.friction_score, 0.35);
        assert!(outcome.report.is_none());
        assert!(pending.list_pending().await.is_empty());
        assert!(outcome.messages.iter().any(|m| m.contains("below threshold")));
    }
}
