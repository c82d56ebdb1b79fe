//! Typed job payloads.
//!
//! `input_data` is stored as an opaque JSONB blob, but it is never
//! interpreted ad hoc: [`JobInput::parse`] resolves the blob into the typed
//! payload for its `job_type` once, at the submission boundary and again
//! when a worker picks the job up. Task bodies only ever see the typed form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::extraction::ExtractedPage;

/// Selects which task body a worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    /// Extract handwritten text from a batch of page images.
    Extraction,
    /// Grade already-extracted answers against reference material.
    Grading,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Grading => "grading",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extraction" => Ok(Self::Extraction),
            "grading" => Ok(Self::Grading),
            other => Err(CoreError::Validation(format!("Unknown job type: {other}"))),
        }
    }
}

/// One page image submitted for extraction.
///
/// The image travels as base64 because it is handed straight to the AI
/// service; this subsystem never decodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageUpload {
    pub filename: String,
    pub image_base64: String,
}

/// Input payload for an extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionInput {
    pub pages: Vec<PageUpload>,
}

/// Input payload for a grading job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingInput {
    /// Already-extracted content, one entry per page.
    pub pages: Vec<ExtractedPage>,
    /// Reference material the answers are graded against.
    pub reference_material: String,
    pub student_name: String,
    #[serde(default)]
    pub quiz_title: Option<String>,
    /// Whether this job accepts a deterministic degraded-mode result when
    /// the AI service is unavailable.
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,
}

fn default_allow_fallback() -> bool {
    true
}

/// A job's input payload, resolved to its typed form.
#[derive(Debug, Clone, PartialEq)]
pub enum JobInput {
    Extraction(ExtractionInput),
    Grading(GradingInput),
}

impl JobInput {
    /// The job type this payload belongs to.
    pub fn job_type(&self) -> JobType {
        match self {
            Self::Extraction(_) => JobType::Extraction,
            Self::Grading(_) => JobType::Grading,
        }
    }

    /// Resolve an opaque `input_data` blob into the typed payload for
    /// `job_type`, validating it in the process.
    pub fn parse(job_type: JobType, value: &serde_json::Value) -> Result<Self, CoreError> {
        match job_type {
            JobType::Extraction => {
                let input: ExtractionInput = serde_json::from_value(value.clone())
                    .map_err(|e| CoreError::Validation(format!("Invalid extraction input: {e}")))?;
                if input.pages.is_empty() {
                    return Err(CoreError::Validation(
                        "Extraction input must contain at least one page".to_string(),
                    ));
                }
                Ok(Self::Extraction(input))
            }
            JobType::Grading => {
                let input: GradingInput = serde_json::from_value(value.clone())
                    .map_err(|e| CoreError::Validation(format!("Invalid grading input: {e}")))?;
                if input.pages.is_empty() {
                    return Err(CoreError::Validation(
                        "Grading input must contain at least one extracted page".to_string(),
                    ));
                }
                Ok(Self::Grading(input))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_str() {
        for jt in [JobType::Extraction, JobType::Grading] {
            assert_eq!(jt.as_str().parse::<JobType>().unwrap(), jt);
        }
        assert!("email".parse::<JobType>().is_err());
    }

    #[test]
    fn parses_extraction_input() {
        let value = serde_json::json!({
            "pages": [{ "filename": "p1.jpg", "image_base64": "aGk=" }]
        });
        let input = JobInput::parse(JobType::Extraction, &value).unwrap();
        assert_eq!(input.job_type(), JobType::Extraction);
    }

    #[test]
    fn rejects_empty_extraction_batch() {
        let value = serde_json::json!({ "pages": [] });
        assert!(JobInput::parse(JobType::Extraction, &value).is_err());
    }

    #[test]
    fn rejects_input_not_matching_job_type() {
        let value = serde_json::json!({
            "pages": [{ "filename": "p1.jpg", "image_base64": "aGk=" }]
        });
        // An extraction payload is not a valid grading payload.
        assert!(JobInput::parse(JobType::Grading, &value).is_err());
    }

    #[test]
    fn grading_fallback_defaults_on() {
        let value = serde_json::json!({
            "pages": [{ "page_number": 1, "filename": "p1.jpg", "handwritten_content": "x" }],
            "reference_material": "chapter 4",
            "student_name": "Ada"
        });
        let JobInput::Grading(input) = JobInput::parse(JobType::Grading, &value).unwrap() else {
            panic!("expected grading input");
        };
        assert!(input.allow_fallback);
        assert_eq!(input.quiz_title, None);
    }
}
