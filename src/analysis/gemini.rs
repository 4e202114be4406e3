//! Google Gemini classifier.
//!
//! Sends the photo inline (base64) with a system instruction and asks for a
//! JSON answer constrained by a response schema. Requires GEMINI_API_KEY.
//!
//! Rate limiting:
//! - HTTP 429 is reported as [`ClassifierError::RateLimited`]
//! - The wait hint comes from the Retry-After header, or from the
//!   `RetryInfo.retryDelay` detail in the error body
//! - Retrying is left to the [`Analyzer`](super::Analyzer)

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::backend::{AnalysisRequest, Classifier, ClassifierError};
use super::config::GeminiConfig;
use super::retry::{parse_duration_secs, parse_retry_after};
use crate::models::VerdictType;

/// Gemini classifier over the Generative Language REST API.
///
/// Holds one `reqwest::Client` (a shared connection pool) for its whole
/// lifetime; clones share the pool.
#[derive(Clone)]
pub struct GeminiClassifier {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    details: Vec<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiErrorDetail {
    retry_delay: Option<String>,
}

/// JSON schema the model's answer must follow.
fn verdict_schema() -> serde_json::Value {
    let verdict_types: Vec<&str> = VerdictType::ALL.iter().map(|v| v.as_str()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "observation": { "type": "STRING" },
            "admissible": { "type": "BOOLEAN" },
            "score": { "type": "INTEGER" },
            "crime": { "type": "STRING" },
            "reasoning": { "type": "STRING" },
            "sentence": { "type": "STRING" },
            "verdictType": { "type": "STRING", "enum": verdict_types },
        },
        "required": [
            "observation", "admissible", "score", "crime",
            "reasoning", "sentence", "verdictType"
        ],
    })
}

/// Pull the `RetryInfo.retryDelay` hint out of a Gemini error body.
fn retry_delay_from_body(body: &str) -> Option<Duration> {
    let parsed: GeminiErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .details
        .iter()
        .find_map(|d| d.retry_delay.as_deref().and_then(parse_duration_secs))
}

fn map_transport_error(e: reqwest::Error) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Http(e)
    }
}

impl GeminiClassifier {
    /// Build the classifier and its HTTP client.
    pub fn new(config: &GeminiConfig) -> Result<Self, ClassifierError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ClassifierError::Other(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }

    fn build_request<'a>(
        &self,
        request: &AnalysisRequest<'a>,
        mime_type: &'static str,
    ) -> GeminiRequest<'a> {
        GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: request.system_instruction,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type,
                            data: base64::engine::general_purpose::STANDARD.encode(request.image),
                        },
                    },
                    GeminiPart::Text {
                        text: request.user_instruction,
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
                response_schema: verdict_schema(),
            },
        }
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn classify(&self, request: AnalysisRequest<'_>) -> Result<String, ClassifierError> {
        let mime_type = request
            .format
            .mime_type()
            .ok_or(ClassifierError::UnsupportedFormat(request.format))?;

        let body = self.build_request(&request, mime_type);
        debug!(
            "Gemini: sending {} bytes ({}) to {}",
            request.image.len(),
            mime_type,
            self.model
        );

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let header = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.unwrap_or_default();
            let retry_after =
                parse_retry_after(header.as_deref()).or_else(|| retry_delay_from_body(&text));
            return Err(ClassifierError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let text = response.text().await.map_err(map_transport_error)?;
        let parsed: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            ClassifierError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ClassifierError::InvalidResponse(format!(
                "Prompt blocked: {}",
                reason
            )));
        }

        let candidate = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| {
                ClassifierError::InvalidResponse("empty response from Gemini".to_string())
            })?;

        let payload: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if payload.trim().is_empty() {
            return Err(ClassifierError::InvalidResponse(format!(
                "no text in Gemini response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(payload)
    }
}

impl std::fmt::Debug for GeminiClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClassifier")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
