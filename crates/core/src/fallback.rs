//! Deterministic fallback grading.
//!
//! Used only when the AI service is unreachable after all retries for a
//! grading job that opts into degraded mode. Scores are a pure function of
//! transcribed content length so the same input always produces the same
//! result, and the worker always has a structurally valid outcome to
//! persist.

use crate::extraction::ExtractedPage;
use crate::grading::{GradeOutcome, GradedPage};

/// Content longer than this many characters earns the high tier.
pub const HIGH_CONTENT_CHARS: usize = 100;

/// Content longer than this many characters earns the middle tier.
pub const MID_CONTENT_CHARS: usize = 50;

/// Score for substantial answers.
pub const SCORE_HIGH: f64 = 8.0;

/// Score for moderate answers.
pub const SCORE_MID: f64 = 6.0;

/// Score for brief or empty answers.
pub const SCORE_LOW: f64 = 5.0;

const FEEDBACK_HIGH: &str = "Good answer that addresses key points.";
const FEEDBACK_MID: &str = "Answer contains relevant information but could include more detail.";
const FEEDBACK_LOW: &str = "Answer is very brief. Consider providing more information.";

/// Score one transcription by length tier.
fn score_content(handwritten: &str) -> (f64, &'static str) {
    let len = handwritten.chars().count();
    if len > HIGH_CONTENT_CHARS {
        (SCORE_HIGH, FEEDBACK_HIGH)
    } else if len > MID_CONTENT_CHARS {
        (SCORE_MID, FEEDBACK_MID)
    } else {
        (SCORE_LOW, FEEDBACK_LOW)
    }
}

/// Produce a per-page grading outcome from already-extracted content.
pub fn fallback_outcome(pages: &[ExtractedPage]) -> GradeOutcome {
    let pages = pages
        .iter()
        .map(|page| {
            let (score, feedback) = score_content(&page.handwritten_content);
            GradedPage {
                filename: page.filename.clone(),
                score,
                handwritten_content: page.handwritten_content.clone(),
                feedback: feedback.to_string(),
            }
        })
        .collect();
    GradeOutcome::PerPage { pages }
}
