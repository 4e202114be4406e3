//! Classifier abstraction for remote vision models.
//!
//! A classifier performs exactly one remote attempt. Retries, deadlines and
//! payload parsing live in [`Analyzer`](super::Analyzer), so production and
//! scripted test classifiers are interchangeable.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::imaging::PhotoFormat;

/// One outbound request: normalized image plus the fixed instruction pair.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub image: &'a [u8],
    pub format: PhotoFormat,
    pub system_instruction: &'a str,
    pub user_instruction: &'a str,
}

/// Failure of a single classifier attempt.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(PhotoFormat),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// A remote capability that judges one photo.
///
/// Returns the model's JSON payload text on success.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short name used in logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Submit one request. Must not retry internally.
    async fn classify(&self, request: AnalysisRequest<'_>) -> Result<String, ClassifierError>;
}
