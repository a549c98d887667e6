//! Aegis governance core.
//!
//! Coordinates a team of autonomous worker agents behind a hierarchical
//! oversight layer. Agents propose; they do not act. Every proposed action
//! passes a fixed-precedence review (operator directives, the keyword
//! standard, friction scoring), and anything with external effect is staged
//! in a durable approval queue until a human resolves it.
//!
//! The crate is a library: [`control::ControlPlane`] is the assembled entry
//! point, constructed with an explicit [`llm::LanguageModel`] and
//! [`notify::Notifier`] so the full pipeline runs offline in tests.

pub mod agents;
pub mod compliance;
pub mod config;
pub mod control;
pub mod directives;
pub mod error;
pub mod feedback;
pub mod llm;
pub mod notify;
pub mod oversight;
pub mod pending;
pub mod telemetry;
pub mod workflow;

pub use config::{GovernanceConfig, LlmConfig};
pub use control::ControlPlane;
pub use directives::{Directive, Priority};
pub use error::{AegisError, Result};
pub use oversight::{AgentReport, OversightReviewer, OversightStatus};
pub use pending::{ActionStatus, PendingAction, PendingActionStore};
pub use telemetry::{TelemetryBus, TelemetryEvent};
pub use workflow::{WorkflowOutcome, WorkflowPhase, WorkflowState};
