//! The shared error taxonomy. Every crate
//! in the workspace that can fail at a domain boundary returns `CoreError`
//! (or wraps it), so the HTTP layer has one place to map errors to status
//! codes and one place to decide what is retryable.

use thiserror::Error;

/// Domain-level failure classification. Each variant maps to exactly one
/// HTTP status in the `server` crate and one retry disposition in
/// `atrium-bus`/`atrium-outbox`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backpressure: {0}")]
    Backpressure(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Worth retrying with backoff (retry policy).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Not worth retrying; surfaced to the caller as a terminal failure.
    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("already resolved: {0}")]
    AlreadyResolved(String),

    #[error("max retries exceeded: {0}")]
    MaxRetriesExceeded(String),

    #[error("worker space cleanup failed: {0}")]
    WorkerSpaceCleanup(String),

    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl CoreError {
    /// Transient and Timeout are worth another attempt under a caller's retry
    /// policy; everything else is terminal for that attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_) | CoreError::Timeout(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_and_timeout_are_retryable() {
        assert!(CoreError::Transient("db hiccup".into()).is_retryable());
        assert!(CoreError::Timeout("approval wait".into()).is_retryable());
        assert!(!CoreError::Permanent("bad params".into()).is_retryable());
        assert!(!CoreError::Validation("missing field".into()).is_retryable());
        assert!(!CoreError::AlreadyResolved("approval already decided".into()).is_retryable());
    }
}
