//! Remote verdict analysis.
//!
//! A [`Classifier`] performs one remote call; the [`Analyzer`] wraps it with
//! per-attempt deadlines, rate-limit retries and payload validation.

mod analyzer;
mod backend;
mod config;
mod gemini;
mod prompts;
mod retry;

pub use analyzer::{Analysis, AnalysisError, Analyzer, DEFAULT_ATTEMPT_TIMEOUT};
pub use backend::{AnalysisRequest, Classifier, ClassifierError};
pub use config::GeminiConfig;
pub use gemini::GeminiClassifier;
pub use prompts::{DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_USER_INSTRUCTION};
pub use retry::{
    backoff_delay, parse_duration_secs, parse_retry_after, RetryPolicy, RetryState,
    DEFAULT_MAX_RETRIES,
};
