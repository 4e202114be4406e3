//! Judging pipeline: validate, normalize, analyze, stamp.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::info;

use super::validator::{PhotoValidator, ValidationError};
use crate::analysis::{AnalysisError, Analyzer, Classifier, ClassifierError, GeminiClassifier};
use crate::config::Settings;
use crate::imaging::Normalizer;
use crate::models::{PhotoMetadata, VerdictResponse};

/// Failure of a judgement.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl ServiceError {
    /// HTTP status the boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::Analysis(e) => e.status_code(),
        }
    }
}

/// Orchestrates one judgement per call. Cheap to clone; clones share the
/// classifier's connection pool.
#[derive(Debug, Clone)]
pub struct VerdictService {
    validator: PhotoValidator,
    normalizer: Normalizer,
    analyzer: Analyzer,
    deadline: Option<Duration>,
}

impl VerdictService {
    pub fn new(validator: PhotoValidator, normalizer: Normalizer, analyzer: Analyzer) -> Self {
        Self {
            validator,
            normalizer,
            analyzer,
            deadline: None,
        }
    }

    /// Build the production service (Gemini classifier) from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ClassifierError> {
        let classifier = GeminiClassifier::new(&settings.gemini)?;
        Ok(Self::with_classifier(settings, Arc::new(classifier)))
    }

    /// Build the service from settings around any classifier.
    pub fn with_classifier(settings: &Settings, classifier: Arc<dyn Classifier>) -> Self {
        let analyzer = Analyzer::new(classifier)
            .with_timeout(settings.gemini.timeout())
            .with_retry_policy(settings.gemini.retry_policy());

        Self {
            validator: PhotoValidator::new(settings.upload.clone()),
            normalizer: Normalizer::new(settings.normalize.clone()),
            analyzer,
            deadline: settings.gemini.deadline(),
        }
    }

    /// Bound every judgement by a wall-clock budget.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Judge one uploaded photo.
    pub async fn judge_photo(
        &self,
        data: &[u8],
        metadata: &PhotoMetadata,
    ) -> Result<VerdictResponse, ServiceError> {
        // A budget too large to represent means no overall deadline.
        let deadline = self.deadline.and_then(|d| Instant::now().checked_add(d));

        self.validator.validate(data, metadata)?;

        let normalized = self.normalizer.normalize(data);
        let analysis = self
            .analyzer
            .analyze_until(&normalized.bytes, deadline)
            .await?;

        let request_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Judged {} ({}, {} -> {} bytes): request {}, score {}",
            metadata.filename,
            normalized.outcome,
            normalized.original_size,
            normalized.len(),
            request_id,
            analysis.verdict.score
        );

        Ok(VerdictResponse {
            admissible: analysis.verdict.admissible,
            score: analysis.verdict.score,
            verdict: analysis.verdict,
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            raw_json: analysis.raw_json,
        })
    }
}
