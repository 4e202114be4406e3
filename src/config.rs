//! Configuration management.
//!
//! Settings come from an optional TOML file, then environment variables
//! (after `.env` is loaded by the binary). Every field has a default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::GeminiConfig;
use crate::imaging::NormalizeConfig;
use crate::services::UploadConfig;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "rechtbank.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
}

impl Settings {
    /// Load settings from `path` (or `rechtbank.toml` if present), then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(settings.with_env_overrides())
    }

    /// Parse a TOML settings file without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variable overrides.
    ///
    /// See [`GeminiConfig::with_env_overrides`]; additionally
    /// `MAX_FILE_SIZE` (bytes) sets the upload ceiling.
    pub fn with_env_overrides(mut self) -> Self {
        self.gemini = self.gemini.with_env_overrides();
        if let Ok(val) = std::env::var("MAX_FILE_SIZE") {
            if let Ok(n) = val.parse() {
                self.upload.max_file_size = n;
            }
        }
        self
    }

    /// Check the settings. `require_api_key` is set when a remote call is
    /// about to be made.
    pub fn validate(&self, require_api_key: bool) -> Result<(), ConfigError> {
        if require_api_key && self.gemini.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Invalid(
                "GEMINI_API_KEY environment variable is required".to_string(),
            ));
        }
        if self.gemini.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "gemini.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(1..=100).contains(&self.normalize.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "normalize.jpeg_quality must be between 1 and 100, got {}",
                self.normalize.jpeg_quality
            )));
        }
        if self.normalize.max_dimension == 0 {
            return Err(ConfigError::Invalid(
                "normalize.max_dimension must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
