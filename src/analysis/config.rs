//! Remote classifier configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::{RetryPolicy, DEFAULT_MAX_RETRIES};

/// Configuration for the Gemini classifier and its retry loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (from GEMINI_API_KEY when not set in the file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,
    /// API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-attempt deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries on rate limiting (attempts = retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Cap for the exponential backoff, in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Wall-clock budget for one whole judgement, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

fn default_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_max_backoff_secs() -> u64 {
    8
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_backoff_secs: default_max_backoff_secs(),
            deadline_secs: None,
        }
    }
}

impl GeminiConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `GEMINI_API_KEY`: API key
    /// - `GEMINI_MODEL`: Model name
    /// - `GEMINI_ENDPOINT`: API base URL
    /// - `GEMINI_TIMEOUT`: Per-attempt deadline in seconds
    /// - `GEMINI_MAX_RETRIES`: Retries on rate limiting
    /// - `GEMINI_DEADLINE`: Whole-judgement budget in seconds
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            if !val.is_empty() {
                self.api_key = Some(val);
            }
        }
        if let Ok(val) = std::env::var("GEMINI_MODEL") {
            self.model = val;
        }
        if let Ok(val) = std::env::var("GEMINI_ENDPOINT") {
            self.endpoint = val;
        }
        if let Ok(val) = std::env::var("GEMINI_TIMEOUT") {
            if let Ok(n) = val.parse() {
                self.timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("GEMINI_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                self.max_retries = n;
            }
        }
        if let Ok(val) = std::env::var("GEMINI_DEADLINE") {
            if let Ok(n) = val.parse() {
                self.deadline_secs = Some(n);
            }
        }
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            ..Default::default()
        }
    }
}
