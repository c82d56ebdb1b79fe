//! Grading task body: score a submission against reference material.

use scriptmark_core::fallback::fallback_outcome;
use scriptmark_core::grading::{GradeOutcome, GradingJobResult};
use scriptmark_core::payload::GradingInput;
use scriptmark_vision::{GradingRequest, Invoker, VisionBackend};

use crate::progress::ProgressReporter;
use crate::tasks::TaskError;

/// Run one attempt of a grading job.
///
/// When the vision service stays unavailable through the invoker's
/// retries and the job opted into degraded mode, the deterministic
/// fallback produces the outcome instead and the result is flagged
/// `degraded`. Terminal service errors fail the job regardless, since
/// a credentials or quota problem is not something a fallback score
/// should paper over silently on every job.
pub async fn run<B: VisionBackend>(
    invoker: &Invoker<B>,
    progress: &mut ProgressReporter,
    input: &GradingInput,
) -> Result<serde_json::Value, TaskError> {
    progress.report(5, "Preparing submission").await;

    let request = GradingRequest {
        pages: input.pages.clone(),
        reference_material: input.reference_material.clone(),
        student_name: Some(input.student_name.clone()),
    };
    progress.report(10, "Grading submission").await;

    let (outcome, degraded) = match invoker.grade(&request).await {
        Ok(raw) => {
            progress.report(65, "Resolving grading response").await;
            match GradeOutcome::from_value(&raw) {
                Ok(outcome) => (outcome, false),
                Err(e) if input.allow_fallback => {
                    tracing::warn!(error = %e, "Unusable grading response, using fallback");
                    (fallback_outcome(&input.pages), true)
                }
                Err(e) => return Err(TaskError::Retryable(e.to_string())),
            }
        }
        Err(err) if err.is_retryable() && input.allow_fallback => {
            tracing::warn!(error = %err, "Vision service unavailable, using fallback grading");
            (fallback_outcome(&input.pages), true)
        }
        Err(err) => return Err(TaskError::from(err)),
    };

    let result = GradingJobResult {
        student_name: input.student_name.clone(),
        quiz_title: input.quiz_title.clone().unwrap_or_default(),
        total_mark: outcome.total_mark(),
        question_count: outcome.question_count(),
        degraded,
        outcome,
    };

    progress.report(95, "Assembling grading results").await;
    serde_json::to_value(&result)
        .map_err(|e| TaskError::Fatal(format!("Result serialization failed: {e}")))
}
