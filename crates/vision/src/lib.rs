//! Client for the external vision-model service used for handwriting
//! extraction and quiz grading.
//!
//! The [`VisionBackend`] trait is the seam between job processing and
//! the real HTTP service: workers talk to an [`Invoker`] wrapping a
//! backend, which adds per-attempt timeouts, error classification, and
//! exponential backoff on transient failures.

pub mod backend;
pub mod client;
pub mod error;
pub mod invoker;

pub use backend::{GradingRequest, VisionBackend};
pub use client::{VisionApi, VisionApiConfig};
pub use error::VisionError;
pub use invoker::{Invoker, RetryConfig};
