//! Resilient photo analysis on top of a [`Classifier`].
//!
//! Each call to [`Analyzer::analyze`] runs its own retry loop:
//! - success with a well-formed payload returns the verdict;
//! - a rate limit is retried (server hint, else exponential backoff) until
//!   the retry ceiling, then surfaces as [`AnalysisError::RateLimited`];
//! - an attempt deadline is terminal ([`AnalysisError::Timeout`]);
//! - a malformed payload is terminal ([`AnalysisError::InvalidResponse`]);
//! - anything else is terminal ([`AnalysisError::Unclassified`]).
//!
//! Attempts are strictly sequential. Dropping the returned future cancels
//! the in-flight attempt or backoff sleep.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backend::{AnalysisRequest, Classifier, ClassifierError};
use super::prompts::{DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_USER_INSTRUCTION};
use super::retry::{RetryPolicy, RetryState};
use crate::imaging::detect_format;
use crate::models::{parse_verdict, VerdictDetails};

/// Default per-attempt deadline.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminal failure of an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("AI analysis timeout")]
    Timeout,

    #[error("AI analysis service temporarily unavailable after {attempts} attempts")]
    RateLimited {
        attempts: u32,
        retry_after: Option<Duration>,
    },

    #[error("Invalid AI response format: {0}")]
    InvalidResponse(String),

    #[error("AI analysis failed: {0}")]
    Unclassified(#[source] ClassifierError),
}

impl AnalysisError {
    /// HTTP status class the boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AnalysisError::Timeout => 504,
            AnalysisError::RateLimited { .. } => 503,
            AnalysisError::InvalidResponse(_) => 502,
            AnalysisError::Unclassified(_) => 500,
        }
    }

    /// Suggested client wait for rate-limit failures.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AnalysisError::RateLimited { retry_after, .. } => {
                Some(retry_after.unwrap_or(Duration::from_secs(60)))
            }
            _ => None,
        }
    }
}

/// A successful analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub verdict: VerdictDetails,
    /// Model payload as received.
    pub raw_json: String,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Runs classifier calls under a deadline and retry policy.
#[derive(Clone)]
pub struct Analyzer {
    classifier: Arc<dyn Classifier>,
    system_instruction: String,
    user_instruction: String,
    attempt_timeout: Duration,
    retry: RetryPolicy,
}

impl Analyzer {
    /// Create an analyzer with the default instructions, 30s attempt
    /// deadline and 3 retries.
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            user_instruction: DEFAULT_USER_INSTRUCTION.to_string(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_instructions(
        mut self,
        system_instruction: impl Into<String>,
        user_instruction: impl Into<String>,
    ) -> Self {
        self.system_instruction = system_instruction.into();
        self.user_instruction = user_instruction.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Analyze a normalized photo with no overall deadline.
    pub async fn analyze(&self, image: &[u8]) -> Result<Analysis, AnalysisError> {
        self.analyze_until(image, None).await
    }

    /// Analyze a normalized photo. When `deadline` is set it bounds the
    /// whole operation, including backoff sleeps.
    pub async fn analyze_until(
        &self,
        image: &[u8],
        deadline: Option<Instant>,
    ) -> Result<Analysis, AnalysisError> {
        let request = AnalysisRequest {
            image,
            format: detect_format(image),
            system_instruction: &self.system_instruction,
            user_instruction: &self.user_instruction,
        };
        let max_attempts = self.retry.max_attempts();
        let mut state = RetryState::new();

        loop {
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                debug!("Analysis deadline expired before attempt {}", state.attempts + 1);
                return Err(AnalysisError::Timeout);
            }

            // An attempt timeout too large to represent leaves the attempt
            // bounded only by the parent deadline, if any.
            let attempt_deadline = match (now.checked_add(self.attempt_timeout), deadline) {
                (Some(at), Some(d)) => Some(at.min(d)),
                (at, d) => at.or(d),
            };

            let attempt = state.attempts;
            state.attempts += 1;
            debug!(
                "{}: attempt {}/{} ({} bytes, {})",
                self.classifier.name(),
                state.attempts,
                max_attempts,
                image.len(),
                request.format
            );

            let call = self.classifier.classify(request);
            let result = match attempt_deadline {
                Some(at) => tokio::time::timeout_at(at, call)
                    .await
                    .unwrap_or_else(|_elapsed| Err(ClassifierError::Timeout)),
                None => call.await,
            };

            let error = match result {
                Ok(payload) => {
                    return match parse_verdict(&payload) {
                        Ok(verdict) => {
                            info!(
                                "{}: verdict after {} attempt(s): admissible={}, score={}, type={}",
                                self.classifier.name(),
                                state.attempts,
                                verdict.admissible,
                                verdict.score,
                                verdict.verdict_type
                            );
                            Ok(Analysis {
                                verdict,
                                raw_json: payload,
                                attempts: state.attempts,
                            })
                        }
                        Err(e) => {
                            warn!("{}: unusable payload: {}", self.classifier.name(), e);
                            Err(AnalysisError::InvalidResponse(e.to_string()))
                        }
                    };
                }
                Err(e) => e,
            };
            state.record_failure(&error);

            match error {
                ClassifierError::RateLimited { retry_after } => {
                    if state.attempts >= max_attempts {
                        warn!(
                            "{}: still rate limited after {} attempts, giving up",
                            self.classifier.name(),
                            state.attempts
                        );
                        return Err(AnalysisError::RateLimited {
                            attempts: state.attempts,
                            retry_after,
                        });
                    }

                    let wait = self.retry.delay_for(attempt, retry_after);
                    let outlives_deadline = deadline.is_some_and(|d| {
                        Instant::now().checked_add(wait).map_or(true, |t| t >= d)
                    });
                    if outlives_deadline {
                        warn!(
                            "{}: backoff of {:?} would outlive the deadline",
                            self.classifier.name(),
                            wait
                        );
                        return Err(AnalysisError::Timeout);
                    }

                    warn!(
                        "{} rate limited (attempt {}), waiting {:?}",
                        self.classifier.name(),
                        state.attempts,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    state.record_wait(wait);
                }
                ClassifierError::Timeout => {
                    warn!(
                        "{}: attempt {} timed out",
                        self.classifier.name(),
                        state.attempts
                    );
                    return Err(AnalysisError::Timeout);
                }
                ClassifierError::InvalidResponse(msg) => {
                    return Err(AnalysisError::InvalidResponse(msg));
                }
                other => return Err(AnalysisError::Unclassified(other)),
            }
        }
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("classifier", &self.classifier.name())
            .field("attempt_timeout", &self.attempt_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const PAYLOAD: &str = r#"{"observation":"Een stoel","admissible":true,"score":8,"crime":"Lichte helling","reasoning":"Artikel 3.14","sentence":"Vrijgesproken","verdictType":"vrijspraak"}"#;

    enum Step {
        Reply(Result<String, ClassifierError>),
        Hang,
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn classify(&self, _request: AnalysisRequest<'_>) -> Result<String, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(r)) => r,
                Some(Step::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(PAYLOAD.to_string())
                }
                None => Err(ClassifierError::Other("script exhausted".to_string())),
            }
        }
    }

    fn rate_limited() -> Step {
        Step::Reply(Err(ClassifierError::RateLimited { retry_after: None }))
    }

    fn ok() -> Step {
        Step::Reply(Ok(PAYLOAD.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_last_allowed_attempt() {
        let scripted = Scripted::new(vec![rate_limited(), rate_limited(), rate_limited(), ok()]);
        let analyzer = Analyzer::new(scripted.clone());

        let start = Instant::now();
        let analysis = analyzer.analyze(b"image").await.unwrap();

        assert_eq!(analysis.attempts, 4);
        assert_eq!(scripted.calls(), 4);
        assert_eq!(analysis.verdict.score, 8);
        // 1s + 2s + 4s of backoff
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(7), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(8), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion() {
        let scripted = Scripted::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            rate_limited(),
            ok(),
        ]);
        let analyzer = Analyzer::new(scripted.clone());

        let err = analyzer.analyze(b"image").await.unwrap_err();
        assert!(matches!(err, AnalysisError::RateLimited { attempts: 4, .. }));
        assert_eq!(scripted.calls(), 4);
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_hint_used_for_backoff() {
        let scripted = Scripted::new(vec![
            Step::Reply(Err(ClassifierError::RateLimited {
                retry_after: Some(Duration::from_secs(20)),
            })),
            ok(),
        ]);
        let analyzer = Analyzer::new(scripted.clone());

        let start = Instant::now();
        analyzer.analyze(b"image").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_not_retried() {
        let scripted = Scripted::new(vec![Step::Hang, ok()]);
        let analyzer = Analyzer::new(scripted.clone()).with_timeout(Duration::from_secs(5));

        let start = Instant::now();
        let err = analyzer.analyze(b"image").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout));
        assert_eq!(scripted.calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(6));
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_leaves_attempt_unbounded() {
        let scripted = Scripted::new(vec![rate_limited(), ok()]);
        let analyzer =
            Analyzer::new(scripted.clone()).with_timeout(Duration::from_secs(u64::MAX));

        let analysis = analyzer.analyze(b"image").await.unwrap();
        assert_eq!(analysis.attempts, 2);
        assert_eq!(scripted.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_still_honours_deadline() {
        let scripted = Scripted::new(vec![Step::Hang, ok()]);
        let analyzer =
            Analyzer::new(scripted.clone()).with_timeout(Duration::from_secs(u64::MAX));

        let deadline = Instant::now() + Duration::from_secs(3);
        let err = analyzer
            .analyze_until(b"image", Some(deadline))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout));
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_reported_timeout_is_terminal() {
        let scripted = Scripted::new(vec![Step::Reply(Err(ClassifierError::Timeout)), ok()]);
        let analyzer = Analyzer::new(scripted.clone());

        assert!(matches!(
            analyzer.analyze(b"image").await,
            Err(AnalysisError::Timeout)
        ));
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_score_is_invalid_response() {
        let payload = PAYLOAD.replace("\"score\":8,", "");
        let scripted = Scripted::new(vec![Step::Reply(Ok(payload)), ok()]);
        let analyzer = Analyzer::new(scripted.clone());

        let err = analyzer.analyze(b"image").await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponse(_)));
        assert_eq!(scripted.calls(), 1);
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn test_empty_response_is_invalid_response() {
        let scripted = Scripted::new(vec![Step::Reply(Err(ClassifierError::InvalidResponse(
            "no candidates".to_string(),
        )))]);
        let analyzer = Analyzer::new(scripted.clone());

        assert!(matches!(
            analyzer.analyze(b"image").await,
            Err(AnalysisError::InvalidResponse(msg)) if msg == "no candidates"
        ));
    }

    #[tokio::test]
    async fn test_inadmissible_score_zeroed() {
        let payload = PAYLOAD.replace("\"admissible\":true", "\"admissible\":false");
        let scripted = Scripted::new(vec![Step::Reply(Ok(payload))]);
        let analysis = Analyzer::new(scripted).analyze(b"image").await.unwrap();

        assert!(!analysis.verdict.admissible);
        assert_eq!(analysis.verdict.score, 0);
    }

    #[tokio::test]
    async fn test_other_errors_are_unclassified() {
        let scripted = Scripted::new(vec![Step::Reply(Err(ClassifierError::Api {
            status: 403,
            body: "API key not valid".to_string(),
        }))]);
        let analyzer = Analyzer::new(scripted.clone());

        let err = analyzer.analyze(b"image").await.unwrap_err();
        match &err {
            AnalysisError::Unclassified(ClassifierError::Api { status, .. }) => {
                assert_eq!(*status, 403)
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_deadline_aborts_backoff() {
        let scripted = Scripted::new(vec![rate_limited(), rate_limited(), ok()]);
        let analyzer = Analyzer::new(scripted.clone());

        // First backoff is 1s, second would be 2s and overshoot the budget.
        let deadline = Instant::now() + Duration::from_millis(2500);
        let start = Instant::now();
        let err = analyzer
            .analyze_until(b"image", Some(deadline))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Timeout));
        assert_eq!(scripted.calls(), 2);
        assert!(start.elapsed() < Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_deadline_bounds_attempt() {
        let scripted = Scripted::new(vec![Step::Hang]);
        let analyzer = Analyzer::new(scripted.clone()).with_timeout(Duration::from_secs(30));

        let start = Instant::now();
        let deadline = start + Duration::from_secs(2);
        let err = analyzer
            .analyze_until(b"image", Some(deadline))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Timeout));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_expired_deadline_makes_no_attempt() {
        let scripted = Scripted::new(vec![ok()]);
        let analyzer = Analyzer::new(scripted.clone());

        let err = analyzer
            .analyze_until(b"image", Some(Instant::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout));
        assert_eq!(scripted.calls(), 0);
    }

    #[test]
    fn test_retry_after_hint() {
        let err = AnalysisError::RateLimited {
            attempts: 4,
            retry_after: Some(Duration::from_secs(12)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert_eq!(AnalysisError::Timeout.retry_after(), None);
    }
}
