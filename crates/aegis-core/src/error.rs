//! Error types for the Aegis governance core
//!
//! One `thiserror` enum covers the whole crate. Governance rejections are
//! deliberately NOT represented here: a rejected review is a normal verdict
//! carried in an [`crate::oversight::AgentReport`], not a failure.

use thiserror::Error;

/// Result type alias for Aegis operations
pub type Result<T> = std::result::Result<T, AegisError>;

/// Main error type for Aegis operations
#[derive(Error, Debug)]
pub enum AegisError {
    /// An outbound call (LLM completion, webhook delivery) failed at the
    /// transport level. Marks the originating phase as failed, never crashes
    /// the process.
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// Unknown action or directive id. Non-fatal; surfaced to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request payload, rejected before entering a state machine.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A durable store could not commit its snapshot. Write failures are
    /// surfaced, never swallowed: a crash after a lost write would otherwise
    /// silently drop an accepted approval.
    #[error("persistence failure for {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors outside store persistence
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AegisError {
    /// Persistence failure with the backing file path attached.
    pub fn persistence(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_display_includes_path() {
        let err = AegisError::persistence(
            "data/pending_actions.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("data/pending_actions.json"));
    }

    #[test]
    fn test_not_found_display() {
        let err = AegisError::NotFound("action ab12cd34".to_string());
        assert_eq!(err.to_string(), "not found: action ab12cd34");
    }
}
