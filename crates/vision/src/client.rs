//! HTTP client for the vision-model service.
//!
//! Speaks the chat-completions protocol: each call sends one user
//! message carrying the prompt and, for extraction, the page image as a
//! data URI. Responses are expected to contain a single JSON object,
//! possibly wrapped in a markdown code fence.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use scriptmark_core::extraction::ExtractedDocument;
use scriptmark_core::payload::PageUpload;

use crate::backend::{GradingRequest, VisionBackend};
use crate::error::VisionError;

/// Connection settings for the vision service.
#[derive(Debug, Clone)]
pub struct VisionApiConfig {
    /// Base URL, e.g. `https://api.example.com`.
    pub base_url: String,
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
}

/// HTTP client for the vision service.
pub struct VisionApi {
    client: reqwest::Client,
    config: VisionApiConfig,
}

/// Chat-completions response envelope. Only the fields we read.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

const EXTRACTION_PROMPT: &str = "\
You are transcribing a scanned quiz page. Return a single JSON object \
with exactly these string fields: document_type, title, subtitle, \
main_instructions, handwritten_content, printed_content, \
reference_info, other_elements. Transcribe handwriting verbatim into \
handwritten_content, preserving line breaks. Use an empty string for \
anything absent. Return only the JSON object.";

impl VisionApi {
    /// Create a new client for the vision service.
    pub fn new(config: VisionApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: VisionApiConfig) -> Self {
        Self { client, config }
    }

    async fn chat(
        &self,
        messages: serde_json::Value,
    ) -> Result<serde_json::Value, VisionError> {
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| VisionError::InvalidResponse(e.to_string()))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| {
                VisionError::InvalidResponse("response contained no choices".into())
            })?;

        parse_json_content(content)
    }
}

#[async_trait]
impl VisionBackend for VisionApi {
    async fn extract_page(
        &self,
        page: &PageUpload,
    ) -> Result<ExtractedDocument, VisionError> {
        let messages = json!([{
            "role": "user",
            "content": [
                { "type": "text", "text": EXTRACTION_PROMPT },
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:image/png;base64,{}", page.image_base64),
                    },
                },
            ],
        }]);

        let value = self.chat(messages).await?;
        serde_json::from_value(value)
            .map_err(|e| VisionError::InvalidResponse(e.to_string()))
    }

    async fn grade(
        &self,
        request: &GradingRequest,
    ) -> Result<serde_json::Value, VisionError> {
        let mut prompt = String::from(
            "You are grading a student quiz submission against the reference \
             material below. Score each page out of 10 and explain the score. \
             Return a single JSON object of the form {\"images\": \
             [{\"filename\": \"...\", \"score\": n, \"handwritten_content\": \
             \"...\", \"feedback\": \"...\"}]} with one entry per page, in \
             the order given. Return only the JSON object.\n\n",
        );
        if let Some(name) = &request.student_name {
            prompt.push_str(&format!("Student: {name}\n\n"));
        }
        prompt.push_str("Reference material:\n");
        prompt.push_str(&request.reference_material);
        prompt.push_str("\n\nStudent answers:\n");
        for page in &request.pages {
            prompt.push_str(&format!(
                "--- Page {} ({}) ---\n{}\n",
                page.page_number, page.filename, page.handwritten_content,
            ));
        }

        let messages = json!([{
            "role": "user",
            "content": [{ "type": "text", "text": prompt }],
        }]);

        self.chat(messages).await
    }
}

/// Map a non-2xx HTTP status onto the error taxonomy.
fn classify_status(status: u16, body: String) -> VisionError {
    match status {
        408 => VisionError::Timeout,
        429 => VisionError::RateLimited,
        401 | 403 => VisionError::Auth,
        402 => VisionError::QuotaExhausted,
        500..=599 => VisionError::Connection(format!("HTTP {status}: {body}")),
        _ => VisionError::BadRequest { status, body },
    }
}

/// Extract the JSON object from a model reply.
///
/// Models routinely wrap output in ```json fences or add a sentence of
/// prose; take everything between the first `{` and the last `}`.
fn parse_json_content(content: &str) -> Result<serde_json::Value, VisionError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json_str = match (start, end) {
        (Some(s), Some(e)) if s < e => &content[s..=e],
        _ => {
            return Err(VisionError::InvalidResponse(
                "no JSON object in response".into(),
            ))
        }
    };
    serde_json::from_str(json_str)
        .map_err(|e| VisionError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_bare_json() {
        let value = parse_json_content(r#"{"title": "Quiz 1"}"#).unwrap();
        assert_eq!(value["title"], "Quiz 1");
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let content = "Here is the transcription:\n```json\n{\"title\": \"Quiz 1\"}\n```\nDone.";
        let value = parse_json_content(content).unwrap();
        assert_eq!(value["title"], "Quiz 1");
    }

    #[test]
    fn rejects_non_json_content() {
        assert_matches!(
            parse_json_content("I could not read the page."),
            Err(VisionError::InvalidResponse(_))
        );
    }

    #[test]
    fn status_classification_matches_taxonomy() {
        assert_matches!(classify_status(408, String::new()), VisionError::Timeout);
        assert_matches!(classify_status(429, String::new()), VisionError::RateLimited);
        assert_matches!(classify_status(401, String::new()), VisionError::Auth);
        assert_matches!(classify_status(403, String::new()), VisionError::Auth);
        assert_matches!(
            classify_status(402, String::new()),
            VisionError::QuotaExhausted
        );
        assert_matches!(
            classify_status(503, String::new()),
            VisionError::Connection(_)
        );
        assert_matches!(
            classify_status(422, String::new()),
            VisionError::BadRequest { status: 422, .. }
        );
    }
}
