//! Centralized error types for redraft.

use thiserror::Error;

/// All errors produced by the drafting core.
#[derive(Error, Debug)]
pub enum DraftError {
    /// The uploaded document was rejected or unparseable. Reported before
    /// any background work starts.
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    /// No credential, or the backend failed its pre-submission health check.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend failed mid-stream. Terminal for that attempt.
    #[error("backend error: {0}")]
    Backend(String),

    /// Transforming reply text failed; callers degrade to a plain rendering.
    #[error("composition error: {0}")]
    Composition(String),
}

/// Convenience alias for `Result<T, DraftError>`.
pub type Result<T> = std::result::Result<T, DraftError>;
