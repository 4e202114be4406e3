//! Upload validation: size ceiling and magic-byte format check.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imaging::detect_format;
use crate::models::PhotoMetadata;
use crate::utils::format_limit;

/// Default upload ceiling (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Upload limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

/// Reasons an upload is refused. Messages are user-facing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Photo file size must not exceed {limit}")]
    TooLarge { size: u64, limit: String },

    #[error("Unsupported image format. Use JPEG, PNG, or WebP")]
    UnsupportedFormat,
}

/// Gate applied to uploads before they reach the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PhotoValidator {
    config: UploadConfig,
}

impl PhotoValidator {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Check declared and actual size, then the detected format.
    pub fn validate(&self, data: &[u8], metadata: &PhotoMetadata) -> Result<(), ValidationError> {
        let size = metadata.size.max(data.len() as u64);
        if size > self.config.max_file_size {
            return Err(ValidationError::TooLarge {
                size,
                limit: format_limit(self.config.max_file_size),
            });
        }

        if !detect_format(data).is_known() {
            return Err(ValidationError::UnsupportedFormat);
        }

        Ok(())
    }
}
