//! Shared error types for scoring, report assembly, and prose generation.
//!
//! Defined in `rubricon-core` so the job worker can downcast and classify
//! errors for retry decisions without string matching.

use thiserror::Error;
use uuid::Uuid;

use crate::model::ItemStatus;
use crate::report::ReportStatus;

/// Errors that can occur when generating report prose through an LLM
/// provider.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl GenerationError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            GenerationError::AuthenticationFailed(_) | GenerationError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GenerationError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Errors raised by the response scoring evaluator.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The response points at a choice the item does not define.
    #[error("response {response_id} selects unknown choice {choice_id}")]
    UnknownChoice { response_id: Uuid, choice_id: Uuid },

    /// A constructed item has no rubric, so nothing can be graded yet.
    #[error("item {item_id} has no rubric")]
    MissingRubric { item_id: Uuid },

    /// The response references an item type the evaluator cannot handle
    /// with the inputs it was given.
    #[error("item {item_id} is not a multiple-choice item")]
    NotMultipleChoice { item_id: Uuid },
}

/// Errors raised when recording a rubric level for a response.
#[derive(Debug, Error)]
pub enum RubricScoreError {
    #[error("criterion {criterion_id} is not part of the item's rubric")]
    UnknownCriterion { criterion_id: Uuid },

    /// The level is not one of the criterion's defined discrete levels.
    #[error("level {level_score} is not defined on criterion \"{criterion}\"")]
    LevelNotDefined { criterion: String, level_score: u8 },
}

/// Errors raised by the report state machine.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot move report from {from} to {to}")]
    InvalidTransition {
        from: ReportStatus,
        to: ReportStatus,
    },

    /// Publication requires at least one generated, non-empty section.
    #[error("report has no generated sections")]
    NoSections,

    /// Publication requires scoring to be complete for the attempt.
    #[error("{unscored} response(s) still unscored")]
    ScoringIncomplete { unscored: u32 },
}

/// Errors raised by item lifecycle transitions.
#[derive(Debug, Error)]
pub enum ItemLifecycleError {
    #[error("cannot move item from {from} to {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },
}

/// Errors raised by attempt lifecycle transitions.
#[derive(Debug, Error)]
pub enum AttemptStateError {
    #[error("attempt {attempt_id} was already submitted")]
    AlreadySubmitted { attempt_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_permanence() {
        assert!(GenerationError::AuthenticationFailed("bad key".into()).is_permanent());
        assert!(GenerationError::ModelNotFound("nope".into()).is_permanent());
        assert!(!GenerationError::RateLimited { retry_after_ms: 500 }.is_permanent());
        assert!(!GenerationError::Timeout(30).is_permanent());
        assert!(!GenerationError::NetworkError("reset".into()).is_permanent());
    }

    #[test]
    fn rate_limit_carries_retry_hint() {
        let err = GenerationError::RateLimited { retry_after_ms: 1200 };
        assert_eq!(err.retry_after_ms(), Some(1200));
        assert_eq!(GenerationError::Timeout(10).retry_after_ms(), None);
    }
}
