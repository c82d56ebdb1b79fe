//! Grading result shapes.
//!
//! The AI service has produced three response shapes over its lifetime:
//! a per-page list under `"images"`, an older per-question list under
//! `"results"`, and a bare overall score. [`GradeOutcome::from_value`]
//! resolves the shape exactly once at the service boundary; everything
//! downstream works with the tagged enum and never re-sniffs keys.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Score and feedback for one graded page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedPage {
    pub filename: String,
    pub score: f64,
    pub handwritten_content: String,
    pub feedback: String,
}

/// One entry of the older per-question response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub question_number: u32,
    pub question_text: String,
    pub student_answer: String,
    pub correct_answer: String,
    pub score: f64,
    pub feedback: String,
}

/// A grading response, resolved into one of the three known shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum GradeOutcome {
    /// One score per submitted page.
    PerPage { pages: Vec<GradedPage> },
    /// One score per detected question (legacy service responses).
    Legacy { questions: Vec<QuestionGrade> },
    /// A single overall score with no per-item breakdown.
    Overall { score: f64 },
}

// Wire forms as the service actually sends them. Private: callers only see
// the resolved `GradeOutcome`.

#[derive(Deserialize)]
struct PerPageWire {
    images: Vec<GradedPageWire>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct GradedPageWire {
    filename: String,
    score: f64,
    handwritten_content: String,
    feedback: String,
}

#[derive(Deserialize)]
struct LegacyWire {
    results: Vec<LegacyEntryWire>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct LegacyEntryWire {
    question_data: LegacyQuestionWire,
    grade: LegacyGradeWire,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct LegacyQuestionWire {
    question_number: u32,
    title: String,
    student_response: String,
    reference_answer: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct LegacyGradeWire {
    score: f64,
    feedback: String,
}

impl GradeOutcome {
    /// Resolve a raw grading response into one of the known shapes.
    ///
    /// Shape detection happens here and nowhere else: `"images"` wins over
    /// `"results"`, which wins over a bare `"total_mark"`/`"score"` number.
    /// Anything else is a validation error the caller treats as a malformed
    /// response.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        if value.get("images").is_some() {
            let wire: PerPageWire = serde_json::from_value(value.clone())
                .map_err(|e| CoreError::Validation(format!("Malformed per-page grading response: {e}")))?;
            return Ok(Self::PerPage {
                pages: wire
                    .images
                    .into_iter()
                    .map(|p| GradedPage {
                        filename: p.filename,
                        score: p.score,
                        handwritten_content: p.handwritten_content,
                        feedback: p.feedback,
                    })
                    .collect(),
            });
        }

        if value.get("results").is_some() {
            let wire: LegacyWire = serde_json::from_value(value.clone())
                .map_err(|e| CoreError::Validation(format!("Malformed legacy grading response: {e}")))?;
            return Ok(Self::Legacy {
                questions: wire
                    .results
                    .into_iter()
                    .enumerate()
                    .map(|(i, entry)| QuestionGrade {
                        question_number: if entry.question_data.question_number > 0 {
                            entry.question_data.question_number
                        } else {
                            i as u32 + 1
                        },
                        question_text: entry.question_data.title,
                        student_answer: entry.question_data.student_response,
                        correct_answer: entry.question_data.reference_answer,
                        score: entry.grade.score,
                        feedback: entry.grade.feedback,
                    })
                    .collect(),
            });
        }

        if let Some(score) = value
            .get("total_mark")
            .or_else(|| value.get("score"))
            .and_then(serde_json::Value::as_f64)
        {
            return Ok(Self::Overall { score });
        }

        Err(CoreError::Validation(
            "Grading response matches no known shape".to_string(),
        ))
    }

    /// Total mark across all graded items.
    pub fn total_mark(&self) -> f64 {
        match self {
            Self::PerPage { pages } => pages.iter().map(|p| p.score).sum(),
            Self::Legacy { questions } => questions.iter().map(|q| q.score).sum(),
            Self::Overall { score } => *score,
        }
    }

    /// Number of per-item entries (zero for an overall-only score).
    pub fn question_count(&self) -> usize {
        match self {
            Self::PerPage { pages } => pages.len(),
            Self::Legacy { questions } => questions.len(),
            Self::Overall { .. } => 0,
        }
    }
}

/// Result payload of a grading job.
///
/// `degraded` is true when the score came from the deterministic fallback
/// policy instead of the AI service; the web tier surfaces it as a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingJobResult {
    pub student_name: String,
    pub quiz_title: String,
    pub total_mark: f64,
    pub question_count: usize,
    pub degraded: bool,
    pub outcome: GradeOutcome,
}
