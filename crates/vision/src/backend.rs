//! The seam between job processing and the vision service.

use async_trait::async_trait;

use scriptmark_core::extraction::{ExtractedDocument, ExtractedPage};
use scriptmark_core::payload::PageUpload;

use crate::error::VisionError;

/// Everything the model needs to grade one submission.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    /// Extracted handwriting, one entry per answer page.
    pub pages: Vec<ExtractedPage>,
    /// Answer key / marking scheme the grader compares against.
    pub reference_material: String,
    pub student_name: Option<String>,
}

/// A single vision-model invocation.
///
/// Implementations perform exactly one attempt per call and classify
/// their own failures; retry policy lives in [`crate::Invoker`]. Tests
/// substitute scripted backends through this trait.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Transcribe one uploaded page into structured document fields.
    async fn extract_page(
        &self,
        page: &PageUpload,
    ) -> Result<ExtractedDocument, VisionError>;

    /// Grade a full submission. Returns the model's raw JSON; the
    /// caller resolves it into a typed outcome exactly once.
    async fn grade(
        &self,
        request: &GradingRequest,
    ) -> Result<serde_json::Value, VisionError>;
}

#[async_trait]
impl<B: VisionBackend + ?Sized> VisionBackend for std::sync::Arc<B> {
    async fn extract_page(
        &self,
        page: &PageUpload,
    ) -> Result<ExtractedDocument, VisionError> {
        (**self).extract_page(page).await
    }

    async fn grade(
        &self,
        request: &GradingRequest,
    ) -> Result<serde_json::Value, VisionError> {
        (**self).grade(request).await
    }
}
