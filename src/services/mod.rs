//! Service layer.
//!
//! - `validator`: upload gate (size ceiling, magic-byte format)
//! - `verdict`: end-to-end judging pipeline

mod validator;
mod verdict;

pub use validator::{PhotoValidator, UploadConfig, ValidationError, DEFAULT_MAX_FILE_SIZE};
pub use verdict::{ServiceError, VerdictService};
