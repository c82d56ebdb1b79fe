//! Error taxonomy for vision-service calls.
//!
//! Every failure is classified as retryable or terminal at the point it
//! is produced; callers branch on [`VisionError::is_retryable`] instead
//! of re-inspecting messages or status codes.

/// Errors from the vision service layer.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// The attempt did not complete within the configured timeout.
    #[error("vision request timed out")]
    Timeout,

    /// The service asked us to slow down (HTTP 429).
    #[error("vision service rate limited the request")]
    RateLimited,

    /// The request never reached the service, or the service itself
    /// failed (network errors, 5xx).
    #[error("vision service unavailable: {0}")]
    Connection(String),

    /// The service answered 2xx but the body was not usable.
    #[error("unusable vision response: {0}")]
    InvalidResponse(String),

    /// The service rejected the request as malformed (4xx other than
    /// auth, quota, and rate-limit statuses). Retrying cannot help.
    #[error("vision service rejected the request ({status}): {body}")]
    BadRequest {
        status: u16,
        body: String,
    },

    /// Credentials are missing or invalid (401/403).
    #[error("vision service authentication failed")]
    Auth,

    /// The account is out of quota (402). Distinct from rate limiting:
    /// waiting does not help within a job's lifetime.
    #[error("vision service quota exhausted")]
    QuotaExhausted,
}

impl VisionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout
            | Self::RateLimited
            | Self::Connection(_)
            | Self::InvalidResponse(_) => true,
            Self::BadRequest { .. } | Self::Auth | Self::QuotaExhausted => false,
        }
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err.to_string())
        }
    }
}
