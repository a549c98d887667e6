//! Control plane: the single assembled entry point.
//!
//! Wires the reviewer, the four worker agents, the durable stores, and the
//! telemetry bus into one facade. Binaries construct this once and drive
//! every operator-facing operation through it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::agents::{AnalysisAgent, BuildAgent, OutreachAgent, ResearchAgent};
use crate::config::GovernanceConfig;
use crate::directives::{Directive, DirectiveRegistry, Priority};
use crate::error::{AegisError, Result};
use crate::feedback::FeedbackLedger;
use crate::llm::LanguageModel;
use crate::notify::{notification_limit, Notifier};
use crate::oversight::{OversightReviewer, OversightStatus};
use crate::pending::{PendingAction, PendingActionStore};
use crate::telemetry::{TelemetryBus, TelemetrySubscription};
use crate::workflow::{WorkflowCoordinator, WorkflowOutcome};

/// Assembled governance core. Construction is explicit dependency
/// injection: the caller supplies the model and notifier so tests can run
/// the full pipeline offline.
pub struct ControlPlane {
    config: Arc<GovernanceConfig>,
    telemetry: Arc<TelemetryBus>,
    directives: Arc<DirectiveRegistry>,
    pending: Arc<PendingActionStore>,
    feedback: Arc<FeedbackLedger>,
    oversight: Arc<OversightReviewer>,
    outreach: Arc<OutreachAgent>,
    workflow: WorkflowCoordinator,
}

impl ControlPlane {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        notifier: Arc<dyn Notifier>,
        config: GovernanceConfig,
        data_dir: impl AsRef<Path>,
    ) -> Self {
        let data_dir: PathBuf = data_dir.as_ref().to_path_buf();
        let config = Arc::new(config);
        let telemetry = Arc::new(TelemetryBus::new());
        let directives = Arc::new(DirectiveRegistry::open(data_dir.join("directives.json")));
        let pending = Arc::new(PendingActionStore::open(
            data_dir.join("pending_actions.json"),
        ));
        let feedback = Arc::new(FeedbackLedger::open(data_dir.join("feedback.json")));
        let notify_limit: Arc<Semaphore> = notification_limit();

        let oversight = Arc::new(OversightReviewer::new(
            Arc::clone(&config),
            Arc::clone(&directives),
            Arc::clone(&telemetry),
        ));

        let max_tokens = 4096;
        let research = Arc::new(ResearchAgent::new(
            Arc::clone(&llm),
            Arc::clone(&telemetry),
            max_tokens,
        ));
        let analysis = Arc::new(AnalysisAgent::new(
            Arc::clone(&llm),
            Arc::clone(&telemetry),
            max_tokens,
        ));
        let build = Arc::new(BuildAgent::new(Arc::clone(&telemetry)));
        let outreach = Arc::new(OutreachAgent::new(
            llm,
            Arc::clone(&telemetry),
            Arc::clone(&pending),
            notifier,
            notify_limit,
            max_tokens,
        ));

        let workflow = WorkflowCoordinator::new(
            Arc::clone(&oversight),
            research,
            analysis,
            build,
            Arc::clone(&outreach),
            Arc::clone(&feedback),
            Arc::clone(&telemetry),
        );

        Self {
            config,
            telemetry,
            directives,
            pending,
            feedback,
            oversight,
            outreach,
            workflow,
        }
    }

    /// Run one task through the governance workflow. Parameters must be a
    /// JSON object.
    pub async fn submit_task(
        &self,
        task_id: &str,
        task_type: &str,
        parameters: Value,
    ) -> Result<WorkflowOutcome> {
        if !parameters.is_object() {
            return Err(AegisError::Validation(
                "task parameters must be a JSON object".to_string(),
            ));
        }
        Ok(self.workflow.execute(task_id, task_type, parameters).await)
    }

    /// Stage an action for approval on behalf of an agent or the transport
    /// layer. Content must be a JSON object.
    pub async fn create_action(
        &self,
        agent: &str,
        action_type: &str,
        content: Value,
        priority: Priority,
    ) -> Result<PendingAction> {
        self.pending.create(agent, action_type, content, priority).await
    }

    /// Actions awaiting operator sign-off, oldest first.
    pub async fn pending_actions(&self) -> Vec<PendingAction> {
        self.pending.list_pending().await
    }

    /// Every staged action regardless of status, oldest first.
    pub async fn all_actions(&self) -> Vec<PendingAction> {
        self.pending.list_all().await
    }

    /// Approve a staged action and deliver it. Missing ids are an error at
    /// this surface.
    pub async fn approve_action(&self, id: &str, notes: Option<&str>) -> Result<PendingAction> {
        let Some(action) = self.pending.approve(id, notes).await? else {
            return Err(AegisError::NotFound(format!("pending action {id} not found")));
        };
        if action.status == crate::pending::ActionStatus::Approved {
            // Approval is durable before delivery is attempted.
            if let Err(e) = self.outreach.execute_approved(id).await {
                tracing::warn!(id = %id, error = %e, "approved action delivery failed");
            }
        }
        Ok(action)
    }

    /// Reject a staged action.
    pub async fn reject_action(&self, id: &str, notes: Option<&str>) -> Result<PendingAction> {
        let Some(action) = self.pending.reject(id, notes).await? else {
            return Err(AegisError::NotFound(format!("pending action {id} not found")));
        };
        Ok(action)
    }

    /// Issue an operator directive. Takes effect on the next review.
    pub async fn add_directive(&self, content: &str, priority: Priority) -> Result<Directive> {
        let directive = self.directives.add(content, priority).await?;
        self.telemetry
            .publish(
                "control",
                json!({
                    "type": "directive_issued",
                    "id": directive.id,
                    "priority": priority.as_str(),
                }),
            )
            .await;
        Ok(directive)
    }

    /// Directives currently in force.
    pub async fn active_directives(&self) -> Vec<Directive> {
        self.directives.list_active().await
    }

    /// Revoke a directive. `false` when unknown or already inactive.
    pub async fn revoke_directive(&self, id: &str) -> Result<bool> {
        self.directives.deactivate(id).await
    }

    /// Attach a live telemetry observer; recent events are replayed.
    pub async fn subscribe_telemetry(&self) -> TelemetrySubscription {
        self.telemetry.subscribe().await
    }

    /// Oversight counters for status surfaces.
    pub async fn oversight_status(&self) -> OversightStatus {
        self.oversight.status().await
    }

    /// One aggregate status document: oversight counters, system health,
    /// queue depth, telemetry load.
    pub async fn status(&self) -> Value {
        let oversight = self.oversight.status().await;
        let health = self.feedback.system_health().await;
        let telemetry = self.telemetry.stats().await;
        let pending = self.pending.list_pending().await;

        json!({
            "firm": self.config.firm_name,
            "tagline": self.config.tagline,
            "oversight": oversight,
            "health": health,
            "pending_actions": pending.len(),
            "telemetry": telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CannedModel;
    use crate::notify::NullNotifier;

    fn control_plane(dir: &tempfile::TempDir) -> ControlPlane {
        ControlPlane::new(
            Arc::new(CannedModel("measured risk-adjusted commentary")),
            Arc::new(NullNotifier),
            GovernanceConfig::default(),
            dir.path(),
        )
    }

    #[tokio::test]
    async fn test_submit_requires_object_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let plane = control_plane(&dir);

        let err = plane
            .submit_task("t1", "research", json!("not an object"))
            .await
            .unwrap_err();
        assert!(matches!(err, AegisError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_action_directly() {
        let dir = tempfile::tempdir().unwrap();
        let plane = control_plane(&dir);

        let action = plane
            .create_action("Outreach", "stakeholder_update", json!({"msg": "hold"}), Priority::Low)
            .await
            .unwrap();
        assert_eq!(plane.pending_actions().await.len(), 1);
        assert_eq!(plane.all_actions().await[0].id, action.id);
    }

    #[tokio::test]
    async fn test_approve_unknown_action_errors() {
        let dir = tempfile::tempdir().unwrap();
        let plane = control_plane(&dir);

        let err = plane.approve_action("deadbeef", None).await.unwrap_err();
        assert!(matches!(err, AegisError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_directive_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let plane = control_plane(&dir);

        let d = plane
            .add_directive("avoid leverage above 2x", Priority::High)
            .await
            .unwrap();
        assert_eq!(plane.active_directives().await.len(), 1);

        assert!(plane.revoke_directive(&d.id).await.unwrap());
        assert!(plane.active_directives().await.is_empty());
        assert!(!plane.revoke_directive(&d.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let plane = control_plane(&dir);

        let status = plane.status().await;
        assert_eq!(status["firm"], "Aegis Capital");
        assert_eq!(status["tagline"], "Autonomous Holdings, Governed Execution");
        assert_eq!(status["pending_actions"], 0);
        assert_eq!(status["health"]["health"], "unknown");
    }

    #[tokio::test]
    async fn test_full_submit_then_approve() {
        let dir = tempfile::tempdir().unwrap();
        let plane = control_plane(&dir);

        let outcome = plane
            .submit_task("t1", "quarterly", json!({"amount": 50_000, "risk_level": "low"}))
            .await
            .unwrap();
        assert!(outcome.oversight_approval);

        let pending = plane.pending_actions().await;
        assert_eq!(pending.len(), 1);

        let approved = plane
            .approve_action(&pending[0].id, Some("ship it"))
            .await
            .unwrap();
        assert_eq!(approved.status.as_str(), "approved");
        assert!(plane.pending_actions().await.is_empty());
    }
}
