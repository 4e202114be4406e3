//! Shared utility functions.

mod format;

pub use format::{format_limit, format_reduction, format_size};
