//! Worker agents.
//!
//! Four role-bound agents, each wrapping the [`LanguageModel`] capability to
//! produce a typed action proposal. None of them acts externally on its own:
//! the workflow routes their combined output through oversight, and the
//! outreach agent additionally stages every communication in the
//! pending-action store for human sign-off.
//!
//! [`LanguageModel`]: crate::llm::LanguageModel

pub mod analysis;
pub mod build;
pub mod outreach;
pub mod research;

pub use analysis::AnalysisAgent;
pub use build::BuildAgent;
pub use outreach::OutreachAgent;
pub use research::ResearchAgent;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational snapshot shared by every worker agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent: String,
    pub actions_count: usize,
    pub last_action: Option<DateTime<Utc>>,
    pub status: String,
}

impl AgentStatus {
    pub(crate) fn operational(agent: &str, actions_count: usize, last_action: Option<DateTime<Utc>>) -> Self {
        Self {
            agent: agent.to_string(),
            actions_count,
            last_action,
            status: "operational".to_string(),
        }
    }
}
