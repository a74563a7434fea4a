//! Job failure classification.

use rubricon_core::error::GenerationError;
use rubricon_store::StoreError;

/// Why a job attempt failed.
///
/// The worker retries transient failures and fails the job outright on
/// permanent ones, so classification lives on the error itself.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The job's inputs cannot produce a result: a bad payload, a
    /// missing prerequisite. Retrying will not help.
    #[error("{0}")]
    Invalid(String),
}

impl JobError {
    /// Permanent failures skip the retry loop.
    pub fn is_permanent(&self) -> bool {
        match self {
            JobError::Generation(e) => e.is_permanent(),
            JobError::Store(_) | JobError::Invalid(_) => true,
        }
    }

    /// Server-suggested delay before the next try, when one was given.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            JobError::Generation(e) => e.retry_after_ms(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_errors_delegate_classification() {
        let rate_limited = JobError::from(GenerationError::RateLimited {
            retry_after_ms: 1500,
        });
        assert!(!rate_limited.is_permanent());
        assert_eq!(rate_limited.retry_after_ms(), Some(1500));

        let auth = JobError::from(GenerationError::AuthenticationFailed("bad key".into()));
        assert!(auth.is_permanent());
        assert_eq!(auth.retry_after_ms(), None);
    }

    #[test]
    fn store_and_invalid_are_always_permanent() {
        let store = JobError::from(StoreError::not_found("attempt", "x"));
        assert!(store.is_permanent());

        let invalid = JobError::Invalid("unreadable import file".into());
        assert!(invalid.is_permanent());
        assert_eq!(invalid.to_string(), "unreadable import file");
    }
}
