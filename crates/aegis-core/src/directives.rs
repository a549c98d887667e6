//! Operator directive registry.
//!
//! Directives are operator-issued constraints injected into the oversight
//! review and agent prompts. The registry durably commits the full directive
//! set before any mutating call returns, so an accepted directive survives a
//! crash.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AegisError, Result};

/// Priority tag on directives and pending actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = AegisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(AegisError::Validation(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

/// One operator-issued constraint. Content is immutable once created;
/// directives leave the active set by explicit deactivation or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    pub id: String,
    pub content: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Default)]
struct DirectiveDocument {
    directives: Vec<Directive>,
}

struct RegistryInner {
    directives: Vec<Directive>,
    counter: u64,
}

/// Durable store of operator directives with monotonically assigned ids.
pub struct DirectiveRegistry {
    path: PathBuf,
    inner: RwLock<RegistryInner>,
}

impl DirectiveRegistry {
    /// Open the registry backed by `path`. A missing or corrupt file starts
    /// the registry empty; the condition is logged, never fatal.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let directives = load_document(&path);
        let counter = directives
            .iter()
            .filter_map(|d| d.id.strip_prefix("DIR-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        Self {
            path,
            inner: RwLock::new(RegistryInner {
                directives,
                counter,
            }),
        }
    }

    /// Issue a new directive. Persists the full set before returning.
    pub async fn add(&self, content: &str, priority: Priority) -> Result<Directive> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AegisError::Validation(
                "directive content must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        inner.counter += 1;
        let directive = Directive {
            id: format!("DIR-{:04}", inner.counter),
            content: content.to_string(),
            priority,
            created_at: Utc::now(),
            active: true,
            expires_at: None,
        };
        inner.directives.push(directive.clone());
        self.persist(&inner.directives)?;

        tracing::info!(id = %directive.id, "directive issued");
        Ok(directive)
    }

    /// All directives that are active and unexpired as of now.
    pub async fn list_active(&self) -> Vec<Directive> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        inner
            .directives
            .iter()
            .filter(|d| d.active && d.expires_at.map_or(true, |exp| exp > now))
            .cloned()
            .collect()
    }

    /// Every directive ever issued, regardless of state.
    pub async fn list_all(&self) -> Vec<Directive> {
        self.inner.read().await.directives.clone()
    }

    /// Deactivate a directive. Returns `false` when the id is unknown or the
    /// directive is already inactive, so a second call is a visible no-op.
    pub async fn deactivate(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(directive) = inner
            .directives
            .iter_mut()
            .find(|d| d.id == id && d.active)
        else {
            return Ok(false);
        };
        directive.active = false;
        self.persist(&inner.directives)?;

        tracing::info!(id = %id, "directive deactivated");
        Ok(true)
    }

    /// Prompt block listing every active directive, for injection into the
    /// oversight persona and worker prompts. Empty when nothing is active.
    pub async fn prompt_fragment(&self) -> String {
        let active = self.list_active().await;
        if active.is_empty() {
            return String::new();
        }

        let mut lines = vec!["[OPERATOR DIRECTIVES - HIGH PRIORITY CONSTRAINTS]".to_string()];
        for d in &active {
            lines.push(format!(
                "- [{}] {}",
                d.priority.as_str().to_uppercase(),
                d.content
            ));
        }
        lines.push("[END DIRECTIVES]".to_string());
        lines.join("\n")
    }

    fn persist(&self, directives: &[Directive]) -> Result<()> {
        write_document(
            &self.path,
            &DirectiveDocument {
                directives: directives.to_vec(),
            },
        )
    }
}

fn load_document(path: &Path) -> Vec<Directive> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<DirectiveDocument>(&raw) {
            Ok(doc) => doc.directives,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt directive store, starting empty");
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    }
}

fn write_document(path: &Path, doc: &DirectiveDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AegisError::persistence(path.display().to_string(), e))?;
        }
    }
    let raw = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, raw).map_err(|e| AegisError::persistence(path.display().to_string(), e))
}
