//! End-to-end governance scenarios through the assembled control plane.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use aegis_core::control::ControlPlane;
use aegis_core::llm::LanguageModel;
use aegis_core::notify::NullNotifier;
use aegis_core::{ActionStatus, AegisError, GovernanceConfig, Priority, Result, WorkflowPhase};

struct CannedModel;

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, _: &str, _: &str, _: f64, _: u32) -> Result<String> {
        Ok("Allocation holds steady with a risk-adjusted tilt toward \
            capital preservation."
            .to_string())
    }
}

struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn complete(&self, _: &str, _: &str, _: f64, _: u32) -> Result<String> {
        Err(AegisError::Upstream("completion endpoint returned 429".to_string()))
    }
}

fn plane_with(model: Arc<dyn LanguageModel>, dir: &tempfile::TempDir) -> ControlPlane {
    ControlPlane::new(
        model,
        Arc::new(NullNotifier),
        GovernanceConfig::default(),
        dir.path(),
    )
}

#[tokio::test]
async fn low_risk_task_completes_and_stages_report() {
    let dir = tempfile::tempdir().unwrap();
    let plane = plane_with(Arc::new(CannedModel), &dir);

    let outcome = plane
        .submit_task(
            "task-approve",
            "quarterly",
            json!({"amount": 50_000, "risk_level": "low"}),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowPhase::Complete);
    assert!(outcome.oversight_approval);
    assert_eq!(outcome.friction_score, 1.0);

    // The report exists only as a staged pending action, not a delivery.
    let report = outcome.report.unwrap();
    assert_eq!(report["status"], "PENDING_APPROVAL");

    let pending = plane.pending_actions().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, ActionStatus::PendingApproval);
    assert_eq!(pending[0].action_type, "report_distribution");
    assert_eq!(pending[0].priority, Priority::High);

    let status = plane.oversight_status().await;
    assert_eq!(status.approved_count, 1);
    assert_eq!(status.rejected_count, 0);
}

#[tokio::test]
async fn high_friction_task_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let plane = plane_with(Arc::new(CannedModel), &dir);

    let outcome = plane
        .submit_task(
            "task-reject",
            "research",
            json!({"amount": 2_000_000, "risk_level": "high", "leverage": 3.0}),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowPhase::Rejected);
    assert!(!outcome.oversight_approval);
    assert_eq!(outcome.friction_score, 0.35);
    assert!(outcome.report.is_none());
    assert!(plane.pending_actions().await.is_empty());

    let status = plane.oversight_status().await;
    assert_eq!(status.rejected_count, 1);
    assert_eq!(status.approval_rate, 0.0);
}

#[tokio::test]
async fn operator_directive_blocks_otherwise_clean_task() {
    let dir = tempfile::tempdir().unwrap();
    let plane = plane_with(Arc::new(CannedModel), &dir);

    plane
        .add_directive("do not mention crypto", Priority::High)
        .await
        .unwrap();

    let outcome = plane
        .submit_task(
            "task-directive",
            "research",
            json!({"amount": 10_000, "topic": "crypto index exposure"}),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, WorkflowPhase::Rejected);
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("directive violation")));
    assert!(plane.pending_actions().await.is_empty());
}

#[tokio::test]
async fn upstream_failure_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let plane = plane_with(Arc::new(FailingModel), &dir);

    let outcome = plane
        .submit_task("task-error", "research", json!({"amount": 10_000}))
        .await
        .unwrap();

    // Failed research and analysis still flow into review; the workflow
    // terminates with a verdict rather than an error.
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("phase research failed")));
    assert!(outcome
        .messages
        .iter()
        .any(|m| m.contains("phase analyze failed")));
    assert!(matches!(
        outcome.status,
        WorkflowPhase::Complete | WorkflowPhase::Rejected
    ));
}

#[tokio::test]
async fn approve_then_telemetry_reflects_activity() {
    let dir = tempfile::tempdir().unwrap();
    let plane = plane_with(Arc::new(CannedModel), &dir);

    plane
        .submit_task(
            "task-telemetry",
            "quarterly",
            json!({"amount": 50_000, "risk_level": "low"}),
        )
        .await
        .unwrap();

    // A late subscriber still sees the most recent events replayed.
    let mut subscription = plane.subscribe_telemetry().await;
    let first = subscription.events.recv().await.unwrap();
    assert!(!first.source.is_empty());

    let pending = plane.pending_actions().await;
    let approved = plane
        .approve_action(&pending[0].id, Some("cleared"))
        .await
        .unwrap();
    assert_eq!(approved.status, ActionStatus::Approved);

    let status = plane.status().await;
    assert_eq!(status["pending_actions"], 0);
    assert_eq!(status["oversight"]["approved_count"], 1);
}
