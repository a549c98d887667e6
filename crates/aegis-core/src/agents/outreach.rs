//! Outreach agent: stakeholder communications.
//!
//! The only agent whose output leaves the system, so every draft it produces
//! is staged in the pending-action store and held for human approval. Nothing
//! is sent until an operator signs off and `execute_approved` runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::{RwLock, Semaphore};

use super::AgentStatus;
use crate::directives::Priority;
use crate::error::{AegisError, Result};
use crate::llm::LanguageModel;
use crate::notify::{dispatch_pending, Notifier};
use crate::pending::{ActionStatus, PendingActionStore};
use crate::telemetry::TelemetryBus;

const ROLE: &str = "Outreach";

const PERSONA: &str = "You are the outreach agent, the voice of the firm. You draft \
investor reports, stakeholder updates, and public announcements. Every word is measured: \
professional, precise, and free of hype. You never promise returns and never understate \
risk.";

struct Communication {
    action_id: String,
    delivered: bool,
    timestamp: DateTime<Utc>,
}

/// Worker agent for external communications. Every output is gated behind
/// the approval queue; this agent cannot publish on its own authority.
pub struct OutreachAgent {
    llm: Arc<dyn LanguageModel>,
    telemetry: Arc<TelemetryBus>,
    pending: Arc<PendingActionStore>,
    notifier: Arc<dyn Notifier>,
    notify_limit: Arc<Semaphore>,
    max_tokens: u32,
    communications: RwLock<Vec<Communication>>,
}

impl OutreachAgent {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        telemetry: Arc<TelemetryBus>,
        pending: Arc<PendingActionStore>,
        notifier: Arc<dyn Notifier>,
        notify_limit: Arc<Semaphore>,
        max_tokens: u32,
    ) -> Self {
        Self {
            llm,
            telemetry,
            pending,
            notifier,
            notify_limit,
            max_tokens,
            communications: RwLock::new(Vec::new()),
        }
    }

    /// Draft a report and stage it for approval. Quarterly reports are
    /// high priority in the queue.
    pub async fn generate_report(&self, report_type: &str, data: &Value) -> Result<Value> {
        self.telemetry
            .publish(
                "outreach",
                json!({"type": "report_generation_started", "report_type": report_type}),
            )
            .await;

        let prompt = format!(
            "Draft a {report_type} investor report based on this data:\n\n{data}\n\n\
             The report must:\n\
             1. Lead with performance in risk-adjusted terms\n\
             2. Disclose material risks plainly\n\
             3. Avoid promissory language\n\
             4. Close with the firm's capital preservation commitment"
        );

        let draft = self.llm.complete(PERSONA, &prompt, 0.6, self.max_tokens).await?;

        let priority = if report_type == "quarterly" {
            Priority::High
        } else {
            Priority::Normal
        };
        let content = json!({
            "report_type": report_type,
            "draft": draft,
            "recipient": "stakeholders",
            "data_summary": truncate(&data.to_string(), 200),
        });

        let action = self
            .stage(ROLE, "report_distribution", content, priority)
            .await?;

        Ok(json!({
            "agent": ROLE,
            "action": "report_generation",
            "report_type": report_type,
            "status": "PENDING_APPROVAL",
            "action_id": action.id,
            "draft_preview": truncate(&draft, 300),
            "timestamp": action.created_at,
        }))
    }

    /// Stage a direct stakeholder update. The message is operator-authored,
    /// so no LLM round-trip.
    pub async fn send_update(&self, recipient: &str, message: &str) -> Result<Value> {
        let content = json!({
            "recipient": recipient,
            "message": message,
        });
        let action = self
            .stage(ROLE, "stakeholder_update", content, Priority::Normal)
            .await?;

        Ok(json!({
            "agent": ROLE,
            "action": "stakeholder_update",
            "recipient": recipient,
            "status": "PENDING_APPROVAL",
            "action_id": action.id,
            "timestamp": action.created_at,
        }))
    }

    /// Draft a public announcement thread and stage it for approval.
    pub async fn generate_announcement(
        &self,
        product: &str,
        description: &str,
        features: &[String],
    ) -> Result<Value> {
        self.telemetry
            .publish(
                "outreach",
                json!({"type": "announcement_started", "product": product}),
            )
            .await;

        let prompt = format!(
            "Draft a public announcement thread for: {product}\n\n\
             Description: {description}\n\
             Key features:\n{}\n\n\
             Tone: professional and measured. No hype, no promissory language.",
            features
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n")
        );

        let draft = self.llm.complete(PERSONA, &prompt, 0.7, self.max_tokens).await?;

        let content = json!({
            "product": product,
            "draft": draft,
            "recipient": "public",
        });
        let action = self
            .stage(ROLE, "announcement_thread", content, Priority::High)
            .await?;

        Ok(json!({
            "agent": ROLE,
            "action": "announcement",
            "product": product,
            "status": "PENDING_APPROVAL",
            "action_id": action.id,
            "draft_preview": truncate(&draft, 300),
            "timestamp": action.created_at,
        }))
    }

    /// Deliver a communication the operator has approved. The action must
    /// exist and must be in the approved state.
    pub async fn execute_approved(&self, action_id: &str) -> Result<Value> {
        let Some(action) = self.pending.get(action_id).await else {
            return Err(AegisError::NotFound(format!(
                "pending action {action_id} not found"
            )));
        };

        if action.status != ActionStatus::Approved {
            return Err(AegisError::Validation(format!(
                "action {action_id} is {}, not approved",
                action.status.as_str()
            )));
        }

        let timestamp = Utc::now();
        {
            let mut communications = self.communications.write().await;
            match communications.iter_mut().find(|c| c.action_id == action_id) {
                Some(record) => {
                    record.delivered = true;
                    record.timestamp = timestamp;
                }
                None => communications.push(Communication {
                    action_id: action_id.to_string(),
                    delivered: true,
                    timestamp,
                }),
            }
        }

        self.telemetry
            .publish(
                "outreach",
                json!({
                    "type": "action_executed",
                    "action_id": action_id,
                    "action_type": action.action_type,
                }),
            )
            .await;

        Ok(json!({
            "agent": ROLE,
            "action": "execute",
            "action_id": action_id,
            "action_type": action.action_type,
            "status": "delivered",
            "timestamp": timestamp,
        }))
    }

    /// Stage in the approval queue, record it locally, and fire a
    /// best-effort operator notification.
    async fn stage(
        &self,
        agent: &str,
        action_type: &str,
        content: Value,
        priority: Priority,
    ) -> Result<crate::pending::PendingAction> {
        let action = self.pending.create(agent, action_type, content, priority).await?;

        self.communications.write().await.push(Communication {
            action_id: action.id.clone(),
            delivered: false,
            timestamp: action.created_at,
        });

        self.telemetry
            .publish(
                "outreach",
                json!({
                    "type": "action_staged",
                    "action_id": action.id,
                    "action_type": action_type,
                    "priority": priority.as_str(),
                }),
            )
            .await;

        dispatch_pending(
            Arc::clone(&self.notifier),
            Arc::clone(&self.notify_limit),
            action.id.clone(),
            agent.to_string(),
            action_type.to_string(),
        );

        Ok(action)
    }

    pub async fn status(&self) -> AgentStatus {
        let communications = self.communications.read().await;
        AgentStatus::operational(
            ROLE,
            communications.len(),
            communications.last().map(|c| c.timestamp),
        )
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
