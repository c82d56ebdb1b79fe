//! Structured text extracted from a scanned answer sheet.
//!
//! The AI service returns a JSON object describing everything it could read
//! off one page. Fields the service omits deserialize to empty strings so a
//! partially-filled response never fails the pipeline.

use serde::{Deserialize, Serialize};

/// Everything the extractor read off a single page image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedDocument {
    /// Brief description of what kind of document the page is.
    pub document_type: String,
    /// Main title or header.
    pub title: String,
    /// Secondary title or identifier.
    pub subtitle: String,
    /// Primary instructions or lead text.
    pub main_instructions: String,
    /// All handwritten text, transcribed. This is what grading runs on.
    pub handwritten_content: String,
    /// Machine-printed text not captured in other fields.
    pub printed_content: String,
    /// Reference numbers, page numbers, dates.
    pub reference_info: String,
    /// Any other notable textual elements.
    pub other_elements: String,
}

/// One page of already-extracted content, as fed into grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub page_number: u32,
    pub filename: String,
    pub handwritten_content: String,
}

/// Per-page outcome of an extraction batch.
///
/// A page that fails keeps its slot with `error` set instead of failing the
/// whole batch, so the caller always gets one entry per submitted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub page_number: u32,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<ExtractedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    /// Successful extraction for one page.
    pub fn extracted(page_number: u32, filename: impl Into<String>, document: ExtractedDocument) -> Self {
        Self {
            page_number,
            filename: filename.into(),
            document: Some(document),
            error: None,
        }
    }

    /// Failed extraction for one page.
    pub fn failed(page_number: u32, filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            page_number,
            filename: filename.into(),
            document: None,
            error: Some(error.into()),
        }
    }

    pub fn is_extracted(&self) -> bool {
        self.document.is_some()
    }
}

/// Result payload of an extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJobResult {
    pub pages: Vec<PageResult>,
}

impl ExtractionJobResult {
    /// Number of pages that extracted successfully.
    pub fn extracted_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_extracted()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_to_empty_defaults() {
        let doc: ExtractedDocument =
            serde_json::from_value(serde_json::json!({ "handwritten_content": "x = 4" })).unwrap();
        assert_eq!(doc.handwritten_content, "x = 4");
        assert_eq!(doc.title, "");
        assert_eq!(doc.printed_content, "");
    }

    #[test]
    fn extracted_count_ignores_failed_pages() {
        let result = ExtractionJobResult {
            pages: vec![
                PageResult::extracted(1, "a.jpg", ExtractedDocument::default()),
                PageResult::failed(2, "b.jpg", "unreadable"),
                PageResult::extracted(3, "c.jpg", ExtractedDocument::default()),
            ],
        };
        assert_eq!(result.extracted_count(), 2);
    }

    #[test]
    fn failed_page_serializes_without_document_field() {
        let page = PageResult::failed(1, "a.jpg", "boom");
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("document").is_none());
        assert_eq!(json["error"], "boom");
    }
}
