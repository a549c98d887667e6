//! Pending-action store: the human-in-the-loop approval gate.
//!
//! Any agent output with external effect is staged here and held until a
//! human resolves it. Every mutation commits the full snapshot to disk
//! before returning, so a crash cannot lose an accepted approval.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::directives::Priority;
use crate::error::{AegisError, Result};

/// Lifecycle of a staged action. Transitions are forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    PendingApproval,
    Approved,
    Rejected,
    Expired,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::PendingApproval => "pending_approval",
            ActionStatus::Approved => "approved",
            ActionStatus::Rejected => "rejected",
            ActionStatus::Expired => "expired",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionStatus::PendingApproval)
    }
}

/// One agent action awaiting human sign-off. `content` is immutable once
/// created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub agent: String,
    pub action_type: String,
    pub content: Value,
    pub created_at: DateTime<Utc>,
    pub status: ActionStatus,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
    pub priority: Priority,
}

#[derive(Serialize, Deserialize, Default)]
struct ActionDocument {
    actions: Vec<PendingAction>,
}

/// Durable store of actions awaiting approval. Reads and writes are
/// serialized store-wide, so concurrent creates never collide on an id and
/// concurrent resolutions of one id settle deterministically.
pub struct PendingActionStore {
    path: PathBuf,
    actions: RwLock<HashMap<String, PendingAction>>,
}

impl PendingActionStore {
    /// Open the store backed by `path`. Missing or corrupt files start the
    /// store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let actions = load_document(&path)
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        Self {
            path,
            actions: RwLock::new(actions),
        }
    }

    /// Stage a new action for approval. Persisted before return.
    pub async fn create(
        &self,
        agent: &str,
        action_type: &str,
        content: Value,
        priority: Priority,
    ) -> Result<PendingAction> {
        if !content.is_object() {
            return Err(AegisError::Validation(
                "pending action content must be a JSON object".to_string(),
            ));
        }

        let action = PendingAction {
            id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            agent: agent.to_string(),
            action_type: action_type.to_string(),
            content,
            created_at: Utc::now(),
            status: ActionStatus::PendingApproval,
            reviewed_at: None,
            reviewer_notes: None,
            priority,
        };

        let mut actions = self.actions.write().await;
        actions.insert(action.id.clone(), action.clone());
        self.persist(&actions)?;

        tracing::info!(id = %action.id, agent = %action.agent, action_type = %action.action_type, "action staged for approval");
        Ok(action)
    }

    /// Approve a pending action. `None` when the id is unknown; an action
    /// already in a terminal state is returned unchanged (terminal states
    /// are immutable, a resolved decision cannot be overwritten).
    pub async fn approve(&self, id: &str, notes: Option<&str>) -> Result<Option<PendingAction>> {
        self.resolve(id, ActionStatus::Approved, notes).await
    }

    /// Reject a pending action; same contract as [`approve`].
    ///
    /// [`approve`]: PendingActionStore::approve
    pub async fn reject(&self, id: &str, notes: Option<&str>) -> Result<Option<PendingAction>> {
        self.resolve(id, ActionStatus::Rejected, notes).await
    }

    async fn resolve(
        &self,
        id: &str,
        status: ActionStatus,
        notes: Option<&str>,
    ) -> Result<Option<PendingAction>> {
        let mut actions = self.actions.write().await;
        let Some(action) = actions.get_mut(id) else {
            return Ok(None);
        };

        if action.status.is_terminal() {
            tracing::warn!(id = %id, status = action.status.as_str(), "ignoring re-resolution of terminal action");
            return Ok(Some(action.clone()));
        }

        action.status = status;
        action.reviewed_at = Some(Utc::now());
        action.reviewer_notes = notes.map(String::from);
        let resolved = action.clone();
        self.persist(&actions)?;

        tracing::info!(id = %id, status = resolved.status.as_str(), "action resolved");
        Ok(Some(resolved))
    }

    /// All actions still awaiting approval, oldest first.
    pub async fn list_pending(&self) -> Vec<PendingAction> {
        let actions = self.actions.read().await;
        let mut pending: Vec<PendingAction> = actions
            .values()
            .filter(|a| a.status == ActionStatus::PendingApproval)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending
    }

    pub async fn get(&self, id: &str) -> Option<PendingAction> {
        self.actions.read().await.get(id).cloned()
    }

    /// Every action regardless of status, oldest first.
    pub async fn list_all(&self) -> Vec<PendingAction> {
        let actions = self.actions.read().await;
        let mut all: Vec<PendingAction> = actions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    fn persist(&self, actions: &HashMap<String, PendingAction>) -> Result<()> {
        let mut snapshot: Vec<PendingAction> = actions.values().cloned().collect();
        snapshot.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        write_document(&self.path, &ActionDocument { actions: snapshot })
    }
}

fn load_document(path: &Path) -> Vec<PendingAction> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<ActionDocument>(&raw) {
            Ok(doc) => doc.actions,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt action store, starting empty");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}

fn write_document(path: &Path, doc: &ActionDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AegisError::persistence(path.display().to_string(), e))?;
        }
    }
    let raw = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, raw).map_err(|e| AegisError::persistence(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, PendingActionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingActionStore::open(dir.path().join("pending_actions.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_dir, store) = temp_store();
        let action = store
            .create("Outreach", "report_distribution", json!({"draft": "q3"}), Priority::High)
            .await
            .unwrap();

        assert_eq!(action.status, ActionStatus::PendingApproval);
        assert_eq!(action.id.len(), 8);

        let fetched = store.get(&action.id).await.unwrap();
        assert_eq!(fetched.content, json!({"draft": "q3"}));
    }

    #[tokio::test]
    async fn test_approve_sets_review_fields() {
        let (_dir, store) = temp_store();
        let action = store
            .create("Outreach", "stakeholder_update", json!({}), Priority::Normal)
            .await
            .unwrap();

        let approved = store
            .approve(&action.id, Some("cleared for release"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(approved.status, ActionStatus::Approved);
        assert!(approved.reviewed_at.is_some());
        assert_eq!(approved.reviewer_notes.as_deref(), Some("cleared for release"));
        assert!(store.list_pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.approve("deadbeef", None).await.unwrap().is_none());
        assert!(store.reject("deadbeef", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminal_state_is_immutable() {
        let (_dir, store) = temp_store();
        let action = store
            .create("Outreach", "announcement_thread", json!({}), Priority::High)
            .await
            .unwrap();

        store.approve(&action.id, Some("first")).await.unwrap();
        let second = store
            .reject(&action.id, Some("second thoughts"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.status, ActionStatus::Approved);
        assert_eq!(second.reviewer_notes.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_non_object_content_rejected() {
        let (_dir, store) = temp_store();
        let err = store
            .create("Outreach", "report", json!("just a string"), Priority::Low)
            .await
            .unwrap_err();
        assert!(matches!(err, AegisError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending_actions.json");

        let (first_id, second_id);
        {
            let store = PendingActionStore::open(&path);
            let a = store
                .create("Outreach", "report_distribution", json!({"n": 1}), Priority::Normal)
                .await
                .unwrap();
            let b = store
                .create("Outreach", "stakeholder_update", json!({"n": 2}), Priority::High)
                .await
                .unwrap();
            store.reject(&b.id, Some("off message")).await.unwrap();
            first_id = a.id;
            second_id = b.id;
        }

        let reloaded = PendingActionStore::open(&path);
        let all = reloaded.list_all().await;
        assert_eq!(all.len(), 2);

        let a = reloaded.get(&first_id).await.unwrap();
        assert_eq!(a.status, ActionStatus::PendingApproval);
        assert_eq!(a.content, json!({"n": 1}));

        let b = reloaded.get(&second_id).await.unwrap();
        assert_eq!(b.status, ActionStatus::Rejected);
        assert_eq!(b.reviewer_notes.as_deref(), Some("off message"));
        assert!(b.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_creates_unique_ids() {
        let (_dir, store) = temp_store();
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create("Outreach", "update", json!({"n": i}), Priority::Normal)
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }
}
