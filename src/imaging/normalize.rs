//! Photo normalization before remote classification.
//!
//! Strategy:
//! 1. Unknown format: returned unchanged.
//! 2. WebP: returned unchanged, it is already efficiently compressed.
//! 3. JPEG/PNG: decoded, downscaled when the larger side exceeds
//!    `max_dimension` (bilinear), then re-encoded (JPEG at `jpeg_quality`,
//!    PNG at the fastest compression level).
//! 4. Decode/encode failures, or an encoding that is not strictly smaller,
//!    fall back to the original bytes.
//!
//! Normalization never returns an error: a compression problem must not
//! block classification.

use std::borrow::Cow;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::format::{detect_format, PhotoFormat};

/// Largest allowed width or height before resizing.
pub const MAX_DIMENSION: u32 = 1600;

/// JPEG re-encode quality (0-100).
pub const JPEG_QUALITY: u8 = 75;

/// Tunables for [`Normalizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_max_dimension() -> u32 {
    MAX_DIMENSION
}

fn default_jpeg_quality() -> u8 {
    JPEG_QUALITY
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Which branch of the normalization policy produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeOutcome {
    /// Format not recognized; input returned as-is.
    SkippedUnknown,
    /// Format passed through without decoding (WebP).
    PassedThrough,
    /// Decoding failed; input returned as-is.
    DecodeFailed,
    /// Encoding failed; input returned as-is.
    EncodeFailed,
    /// Re-encoded output was not smaller; input returned as-is.
    RejectedLarger,
    /// Re-encoded (and possibly resized) output returned.
    Compressed,
}

impl NormalizeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizeOutcome::SkippedUnknown => "skipped-unknown",
            NormalizeOutcome::PassedThrough => "passed-through",
            NormalizeOutcome::DecodeFailed => "decode-failed",
            NormalizeOutcome::EncodeFailed => "encode-failed",
            NormalizeOutcome::RejectedLarger => "rejected-larger",
            NormalizeOutcome::Compressed => "resized-and-compressed",
        }
    }
}

impl std::fmt::Display for NormalizeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone)]
pub struct NormalizationResult<'a> {
    /// Bytes to transmit. Borrowed when the original is reused.
    pub bytes: Cow<'a, [u8]>,
    pub format: PhotoFormat,
    /// The pixel grid was downscaled before encoding.
    pub resized: bool,
    /// The returned bytes are a fresh encoding, not the original.
    pub reencoded: bool,
    pub outcome: NormalizeOutcome,
    pub original_size: usize,
}

impl<'a> NormalizationResult<'a> {
    fn unchanged(data: &'a [u8], format: PhotoFormat, outcome: NormalizeOutcome) -> Self {
        Self {
            bytes: Cow::Borrowed(data),
            format,
            resized: false,
            reencoded: false,
            outcome,
            original_size: data.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Original size divided by output size.
    pub fn ratio(&self) -> f64 {
        if self.bytes.is_empty() {
            return 1.0;
        }
        self.original_size as f64 / self.bytes.len() as f64
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_owned()
    }
}

/// Resizes and re-encodes uploads so they are cheap to send.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    /// Normalize `data`, falling back to the original bytes on any failure.
    pub fn normalize<'a>(&self, data: &'a [u8]) -> NormalizationResult<'a> {
        let original_size = data.len();
        let format = detect_format(data);

        let codec = match (format, format.codec()) {
            (PhotoFormat::WebP, _) => {
                debug!(
                    original_size,
                    format = %format,
                    branch = NormalizeOutcome::PassedThrough.as_str(),
                    "WebP pass-through"
                );
                return NormalizationResult::unchanged(
                    data,
                    format,
                    NormalizeOutcome::PassedThrough,
                );
            }
            (_, Some(codec)) => codec,
            (_, None) => {
                debug!(
                    original_size,
                    branch = NormalizeOutcome::SkippedUnknown.as_str(),
                    "Skipping normalization: unknown image format"
                );
                return NormalizationResult::unchanged(
                    data,
                    format,
                    NormalizeOutcome::SkippedUnknown,
                );
            }
        };

        let img = match image::load_from_memory_with_format(data, codec) {
            Ok(img) => img,
            Err(e) => {
                warn!(
                    original_size,
                    format = %format,
                    branch = NormalizeOutcome::DecodeFailed.as_str(),
                    "Decode failed, using original: {}",
                    e
                );
                return NormalizationResult::unchanged(
                    data,
                    format,
                    NormalizeOutcome::DecodeFailed,
                );
            }
        };

        let (img, resized) = self.resize_if_needed(img);

        let encoded = match self.encode(&img, format) {
            Ok(buf) => buf,
            Err(e) => {
                warn!(
                    original_size,
                    format = %format,
                    branch = NormalizeOutcome::EncodeFailed.as_str(),
                    "Encode failed, using original: {}",
                    e
                );
                return NormalizationResult::unchanged(
                    data,
                    format,
                    NormalizeOutcome::EncodeFailed,
                );
            }
        };

        let compressed_size = encoded.len();
        if compressed_size >= original_size {
            info!(
                original_size,
                compressed_size,
                format = %format,
                branch = NormalizeOutcome::RejectedLarger.as_str(),
                "Compressed image not smaller, using original"
            );
            return NormalizationResult::unchanged(data, format, NormalizeOutcome::RejectedLarger);
        }

        let ratio = original_size as f64 / compressed_size as f64;
        info!(
            original_size,
            compressed_size,
            ratio = %format!("{:.2}", ratio),
            resized,
            format = %format,
            branch = NormalizeOutcome::Compressed.as_str(),
            "Compressed image"
        );

        NormalizationResult {
            bytes: Cow::Owned(encoded),
            format,
            resized,
            reencoded: true,
            outcome: NormalizeOutcome::Compressed,
            original_size,
        }
    }

    /// Downscale so the larger side equals `max_dimension`, keeping aspect
    /// ratio with truncating integer arithmetic.
    fn resize_if_needed(&self, img: DynamicImage) -> (DynamicImage, bool) {
        let (width, height) = (img.width(), img.height());
        match target_dimensions(width, height, self.config.max_dimension) {
            Some((new_width, new_height)) => {
                debug!(
                    "Resizing {}x{} -> {}x{}",
                    width, height, new_width, new_height
                );
                (
                    img.resize_exact(new_width, new_height, FilterType::Triangle),
                    true,
                )
            }
            None => (img, false),
        }
    }

    fn encode(&self, img: &DynamicImage, format: PhotoFormat) -> image::ImageResult<Vec<u8>> {
        let mut buf = Vec::new();
        match format {
            PhotoFormat::Jpeg => {
                let encoder =
                    JpegEncoder::new_with_quality(Cursor::new(&mut buf), self.config.jpeg_quality);
                // JPEG has no alpha channel; anything else must be flattened first.
                match img {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => {
                        img.write_with_encoder(encoder)?
                    }
                    other => DynamicImage::ImageRgb8(other.to_rgb8()).write_with_encoder(encoder)?,
                }
            }
            PhotoFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    Cursor::new(&mut buf),
                    CompressionType::Fast,
                    PngFilter::Adaptive,
                );
                img.write_with_encoder(encoder)?;
            }
            PhotoFormat::WebP | PhotoFormat::Unknown => {
                return Err(image::ImageError::Unsupported(
                    image::error::UnsupportedError::from_format_and_kind(
                        image::error::ImageFormatHint::Name(format.to_string()),
                        image::error::UnsupportedErrorKind::GenericFeature(
                            "re-encoding".to_string(),
                        ),
                    ),
                ));
            }
        }
        Ok(buf)
    }
}

/// Target size for a `width`x`height` image so neither side exceeds
/// `max_dimension`, or `None` if it already fits.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if width <= max_dimension && height <= max_dimension {
        return None;
    }

    let (w, h, max) = (width as u64, height as u64, max_dimension as u64);
    let (new_width, new_height) = if w > h {
        (max, h * max / w)
    } else {
        (w * max / h, max)
    };

    Some((new_width.max(1) as u32, new_height.max(1) as u32))
}

/// Normalize with the default policy (1600px bound, JPEG quality 75).
pub fn normalize(data: &[u8]) -> NormalizationResult<'_> {
    Normalizer::default().normalize(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn noisy_rgb(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)) as u8;
            Rgb([v, v.wrapping_add(80), (x + y) as u8])
        })
    }

    fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
        DynamicImage::ImageRgb8(img.clone())
            .write_with_encoder(encoder)
            .unwrap();
        buf
    }

    fn encode_png_best(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            Cursor::new(&mut buf),
            CompressionType::Best,
            PngFilter::Adaptive,
        );
        img.write_with_encoder(encoder).unwrap();
        buf
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(target_dimensions(1600, 1600, 1600), None);
        assert_eq!(target_dimensions(800, 600, 1600), None);
        assert_eq!(target_dimensions(3200, 1600, 1600), Some((1600, 800)));
        assert_eq!(target_dimensions(1000, 4000, 1600), Some((400, 1600)));
        // Truncating: 3000 * 1600 / 4000 = 1200, 1001 * 1600 / 3000 = 533.86
        assert_eq!(target_dimensions(4000, 3000, 1600), Some((1600, 1200)));
        assert_eq!(target_dimensions(3000, 1001, 1600), Some((1600, 533)));
        // Square: height branch
        assert_eq!(target_dimensions(2000, 2000, 1600), Some((1600, 1600)));
        // Degenerate strip never collapses to zero
        assert_eq!(target_dimensions(10000, 1, 1600), Some((1600, 1)));
    }

    #[test]
    fn test_unknown_format_unchanged() {
        let data = b"definitely not an image at all".to_vec();
        let result = normalize(&data);
        assert_eq!(result.outcome, NormalizeOutcome::SkippedUnknown);
        assert_eq!(result.format, PhotoFormat::Unknown);
        assert_eq!(&*result.bytes, &data[..]);
        assert!(matches!(result.bytes, Cow::Borrowed(_)));
    }

    #[test]
    fn test_webp_passed_through() {
        let mut data = b"RIFF\x00\x00\x00\x00WEBPVP8 ".to_vec();
        data.extend_from_slice(&[0u8; 64]);
        let result = normalize(&data);
        assert_eq!(result.outcome, NormalizeOutcome::PassedThrough);
        assert_eq!(result.format, PhotoFormat::WebP);
        assert_eq!(&*result.bytes, &data[..]);
        assert!(!result.reencoded);
    }

    #[test]
    fn test_corrupt_jpeg_falls_back() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0x42; 100]);
        let result = normalize(&data);
        assert_eq!(result.outcome, NormalizeOutcome::DecodeFailed);
        assert_eq!(&*result.bytes, &data[..]);
    }

    #[test]
    fn test_high_quality_jpeg_is_compressed() {
        let img = noisy_rgb(400, 300);
        let data = encode_jpeg(&img, 100);
        let result = normalize(&data);

        assert_eq!(result.outcome, NormalizeOutcome::Compressed);
        assert!(result.reencoded);
        assert!(!result.resized);
        assert!(result.len() < data.len());
        assert!(result.ratio() > 1.0);

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));
    }

    #[test]
    fn test_oversized_jpeg_is_resized() {
        let img = noisy_rgb(2400, 1200);
        let data = encode_jpeg(&img, 95);
        let result = normalize(&data);

        assert_eq!(result.outcome, NormalizeOutcome::Compressed);
        assert!(result.resized);
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1600, 800));
    }

    #[test]
    fn test_low_quality_jpeg_rejected_larger() {
        // Re-encoding at a higher quality than the source only adds bytes.
        let data = encode_jpeg(&noisy_rgb(320, 240), 5);
        let result = normalize(&data);

        assert_eq!(result.outcome, NormalizeOutcome::RejectedLarger);
        assert_eq!(&*result.bytes, &data[..]);
        assert!(!result.reencoded);
    }

    #[test]
    fn test_rgba_png_keeps_alpha_and_dimensions() {
        // Hashed pixels barely compress, so the downscaled fast encode is
        // smaller than the best-effort original.
        let img = RgbaImage::from_fn(2000, 500, |x, y| {
            // splitmix64 over the pixel index
            let mut z = (y as u64 * 2000 + x as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            Rgba([z as u8, (z >> 8) as u8, (z >> 16) as u8, 64 + (z >> 57) as u8])
        });
        let data = encode_png_best(DynamicImage::ImageRgba8(img));
        let result = normalize(&data);

        assert_eq!(result.outcome, NormalizeOutcome::Compressed);
        assert!(result.resized);
        assert!(result.reencoded);
        assert!(result.len() < data.len());
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1600, 400));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_custom_quality_and_bound() {
        let normalizer = Normalizer::new(NormalizeConfig {
            max_dimension: 100,
            jpeg_quality: 50,
        });
        let data = encode_jpeg(&noisy_rgb(300, 150), 95);
        let result = normalizer.normalize(&data);

        assert!(result.resized);
        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(NormalizeOutcome::Compressed.to_string(), "resized-and-compressed");
        assert_eq!(NormalizeOutcome::SkippedUnknown.as_str(), "skipped-unknown");
    }
}
