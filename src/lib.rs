//! rechtbank - the furniture court.
//!
//! Normalizes user photos and asks a remote vision model for a verdict:
//! - `imaging`: magic-byte format detection and resize/re-encode normalization
//! - `analysis`: classifier abstraction, Gemini client, retrying analyzer
//! - `services`: upload validation and the judging pipeline
//! - `models`: verdict types and payload parsing

pub mod analysis;
pub mod config;
pub mod imaging;
pub mod models;
pub mod services;
pub mod utils;
