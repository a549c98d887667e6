//! Operator notification capability.
//!
//! Best-effort webhook pings when an action lands in the approval queue.
//! Delivery failures are logged and swallowed; staging an action never
//! depends on a notification arriving.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::Semaphore;

/// Concurrent in-flight notification cap. Dispatch is fire-and-forget, so
/// the bound keeps a flapping webhook from accumulating tasks.
const MAX_IN_FLIGHT: usize = 8;

/// Best-effort notification capability consumed by agents that stage
/// pending actions.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify the operator that an action awaits approval. Returns whether
    /// delivery succeeded; callers may ignore the result.
    async fn notify_pending(&self, action_id: &str, agent: &str, action_type: &str) -> bool;
}

/// Posts an embed-style JSON payload to the configured operator webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_pending(&self, action_id: &str, agent: &str, action_type: &str) -> bool {
        let Some(url) = &self.url else {
            return false;
        };

        let payload = json!({
            "embeds": [{
                "title": "Action requires approval",
                "description": format!(
                    "**Action ID:** {action_id}\n**Agent:** {agent}\n**Type:** {action_type}"
                ),
                "timestamp": Utc::now().to_rfc3339(),
            }]
        });

        match self
            .http
            .post(url)
            .json(&payload)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(action_id = %action_id, error = %e, "pending-action notification failed");
                false
            }
        }
    }
}

/// Notifier for tests and unconfigured deployments.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_pending(&self, _: &str, _: &str, _: &str) -> bool {
        false
    }
}

/// Fire-and-forget dispatch: spawns a detached task gated by a shared
/// semaphore so notification bursts stay bounded. The originating call
/// returns immediately.
pub fn dispatch_pending(
    notifier: Arc<dyn Notifier>,
    limit: Arc<Semaphore>,
    action_id: String,
    agent: String,
    action_type: String,
) {
    tokio::spawn(async move {
        let Ok(_permit) = limit.acquire().await else {
            return;
        };
        let delivered = notifier
            .notify_pending(&action_id, &agent, &action_type)
            .await;
        if !delivered {
            tracing::debug!(action_id = %action_id, "pending-action notification not delivered");
        }
    });
}

/// Shared semaphore sized for notification dispatch.
pub fn notification_limit() -> Arc<Semaphore> {
    Arc::new(Semaphore::new(MAX_IN_FLIGHT))
}
