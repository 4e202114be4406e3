//! Photo format detection and normalization.

mod format;
mod normalize;

pub use format::{detect_format, ImageAsset, PhotoFormat, SIGNATURE_LEN};
pub use normalize::{
    normalize, target_dimensions, NormalizationResult, NormalizeConfig, NormalizeOutcome,
    Normalizer, JPEG_QUALITY, MAX_DIMENSION,
};
