//! Task bodies for each job type.
//!
//! A task body runs one attempt of a claimed job and returns either the
//! result payload to persist or a [`TaskError`] telling the runner how
//! to dispose of the job. Retry policy for individual vision calls
//! lives in the invoker; `TaskError` is about the job as a whole.

pub mod extraction;
pub mod grading;

use scriptmark_vision::VisionError;

/// How a task attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No later attempt can succeed: fail the job now without touching
    /// its retry budget.
    #[error("{0}")]
    Fatal(String),

    /// The attempt failed for a transient reason; the job may be
    /// requeued if its retry budget allows.
    #[error("{0}")]
    Retryable(String),
}

impl From<VisionError> for TaskError {
    fn from(err: VisionError) -> Self {
        if err.is_retryable() {
            Self::Retryable(err.to_string())
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn vision_errors_map_onto_job_disposition() {
        assert_matches!(
            TaskError::from(VisionError::Timeout),
            TaskError::Retryable(_)
        );
        assert_matches!(
            TaskError::from(VisionError::RateLimited),
            TaskError::Retryable(_)
        );
        assert_matches!(TaskError::from(VisionError::Auth), TaskError::Fatal(_));
        assert_matches!(
            TaskError::from(VisionError::QuotaExhausted),
            TaskError::Fatal(_)
        );
    }
}
