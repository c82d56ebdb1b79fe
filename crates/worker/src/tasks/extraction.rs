//! Extraction task body: transcribe each uploaded page image.

use scriptmark_core::extraction::{ExtractionJobResult, PageResult};
use scriptmark_core::payload::ExtractionInput;
use scriptmark_vision::{Invoker, VisionBackend};

use crate::progress::ProgressReporter;
use crate::tasks::TaskError;

/// Run one attempt of an extraction job.
///
/// Pages are processed in order. A page whose vision calls fail for a
/// transient reason keeps its slot in the result with `error` set and
/// the batch continues; a terminal error (bad credentials, quota) fails
/// the whole job since every remaining page would hit it too. A batch
/// where no page extracted at all is a transient failure of the job.
pub async fn run<B: VisionBackend>(
    invoker: &Invoker<B>,
    progress: &mut ProgressReporter,
    input: &ExtractionInput,
) -> Result<serde_json::Value, TaskError> {
    let total = input.pages.len();
    progress.report(5, "Starting extraction").await;

    let mut pages = Vec::with_capacity(total);
    for (i, page) in input.pages.iter().enumerate() {
        let page_number = i as u32 + 1;

        match invoker.extract_page(page).await {
            Ok(document) => {
                pages.push(PageResult::extracted(page_number, &page.filename, document));
            }
            Err(err) if !err.is_retryable() => {
                return Err(TaskError::from(err));
            }
            Err(err) => {
                tracing::warn!(
                    page_number,
                    filename = %page.filename,
                    error = %err,
                    "Page extraction failed",
                );
                pages.push(PageResult::failed(page_number, &page.filename, err.to_string()));
            }
        }

        // usize arithmetic: a large batch must not overflow the narrow
        // progress column type.
        let pct = 5 + (page_number as usize * 90 / total) as i16;
        if !progress
            .report(pct, &format!("Extracted page {page_number}/{total}"))
            .await
        {
            return Err(TaskError::Fatal("Job is no longer processing".into()));
        }
    }

    let result = ExtractionJobResult { pages };
    if result.extracted_count() == 0 {
        return Err(TaskError::Retryable(format!(
            "All {total} pages failed extraction"
        )));
    }

    progress.report(95, "Assembling extraction results").await;
    serde_json::to_value(&result)
        .map_err(|e| TaskError::Fatal(format!("Result serialization failed: {e}")))
}
