//! Retry wrapper around a [`VisionBackend`].
//!
//! Each logical call gets up to `max_attempts` tries. Every attempt
//! runs under its own timeout; retryable failures sleep an
//! exponentially growing delay before the next try, terminal failures
//! return immediately.

use std::future::Future;
use std::time::Duration;

use scriptmark_core::extraction::ExtractedDocument;
use scriptmark_core::payload::PageUpload;

use crate::backend::{GradingRequest, VisionBackend};
use crate::error::VisionError;

/// Tunable parameters for vision call retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,
    /// Wall-clock budget for a single attempt.
    pub attempt_timeout: Duration,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Delay after the given failed attempt (1-based).
    ///
    /// The result is clamped to [`RetryConfig::max_delay`].
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// A [`VisionBackend`] with retries, timeouts, and backoff applied.
pub struct Invoker<B> {
    backend: B,
    config: RetryConfig,
}

impl<B: VisionBackend> Invoker<B> {
    pub fn new(backend: B, config: RetryConfig) -> Self {
        Self { backend, config }
    }

    /// Transcribe a page, retrying transient failures.
    pub async fn extract_page(
        &self,
        page: &PageUpload,
    ) -> Result<ExtractedDocument, VisionError> {
        self.run("extract_page", || self.backend.extract_page(page))
            .await
    }

    /// Grade a submission, retrying transient failures.
    pub async fn grade(
        &self,
        request: &GradingRequest,
    ) -> Result<serde_json::Value, VisionError> {
        self.run("grade", || self.backend.grade(request)).await
    }

    async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, VisionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VisionError>>,
    {
        let mut attempt = 1u32;
        loop {
            let outcome = tokio::time::timeout(self.config.attempt_timeout, call())
                .await
                .unwrap_or(Err(VisionError::Timeout));

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    tracing::warn!(op, attempt, error = %err, "Vision call failed terminally");
                    return Err(err);
                }
                Err(err) => err,
            };

            if attempt >= self.config.max_attempts {
                tracing::warn!(
                    op,
                    attempt,
                    error = %err,
                    "Vision call exhausted its attempts",
                );
                return Err(err);
            }

            let delay = self.config.backoff_delay(attempt);
            tracing::warn!(
                op,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Vision call failed, retrying",
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    /// Backend that fails a fixed number of times before succeeding.
    struct FlakyBackend {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> VisionError,
    }

    impl FlakyBackend {
        fn new(failures: u32, error: fn() -> VisionError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error,
            }
        }

        fn attempt(&self) -> Result<(), VisionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl VisionBackend for FlakyBackend {
        async fn extract_page(
            &self,
            _page: &PageUpload,
        ) -> Result<ExtractedDocument, VisionError> {
            self.attempt()?;
            Ok(ExtractedDocument::default())
        }

        async fn grade(
            &self,
            _request: &GradingRequest,
        ) -> Result<serde_json::Value, VisionError> {
            self.attempt()?;
            Ok(serde_json::json!({"results": []}))
        }
    }

    /// Backend that never returns within any reasonable timeout.
    struct HangingBackend;

    #[async_trait]
    impl VisionBackend for HangingBackend {
        async fn extract_page(
            &self,
            _page: &PageUpload,
        ) -> Result<ExtractedDocument, VisionError> {
            std::future::pending().await
        }

        async fn grade(
            &self,
            _request: &GradingRequest,
        ) -> Result<serde_json::Value, VisionError> {
            std::future::pending().await
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            attempt_timeout: Duration::from_millis(20),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn page() -> PageUpload {
        PageUpload {
            filename: "p1.png".into(),
            image_base64: "aGk=".into(),
        }
    }

    #[test]
    fn full_backoff_sequence() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(4), Duration::from_secs(8));
        assert_eq!(config.backoff_delay(5), Duration::from_secs(16));
        // Clamped from here on.
        assert_eq!(config.backoff_delay(6), Duration::from_secs(30));
        assert_eq!(config.backoff_delay(60), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let backend = FlakyBackend::new(2, || VisionError::RateLimited);
        let invoker = Invoker::new(backend, fast_config(3));

        let result = invoker.extract_page(&page()).await;
        assert!(result.is_ok());
        assert_eq!(invoker.backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let backend = FlakyBackend::new(u32::MAX, || {
            VisionError::Connection("refused".into())
        });
        let invoker = Invoker::new(backend, fast_config(3));

        let result = invoker.grade(&GradingRequest {
            pages: Vec::new(),
            reference_material: String::new(),
            student_name: None,
        })
        .await;
        assert_matches!(result, Err(VisionError::Connection(_)));
        assert_eq!(invoker.backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_error_short_circuits() {
        let backend = FlakyBackend::new(u32::MAX, || VisionError::Auth);
        let invoker = Invoker::new(backend, fast_config(3));

        let result = invoker.extract_page(&page()).await;
        assert_matches!(result, Err(VisionError::Auth));
        assert_eq!(invoker.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_attempts_time_out_and_retry() {
        let invoker = Invoker::new(HangingBackend, fast_config(2));

        let result = invoker.extract_page(&page()).await;
        assert_matches!(result, Err(VisionError::Timeout));
    }
}
