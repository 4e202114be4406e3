//! Magic-byte format detection for uploaded photos.
//!
//! The declared content type of an upload is never trusted; every format
//! decision in the pipeline goes through [`detect_format`].

use std::io::Cursor;

/// Number of leading bytes inspected by [`detect_format`].
pub const SIGNATURE_LEN: usize = 12;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const RIFF_MAGIC: [u8; 4] = *b"RIFF";
const WEBP_MAGIC: [u8; 4] = *b"WEBP";

/// Photo formats recognized by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoFormat {
    /// Baseline lossy (JPEG).
    Jpeg,
    /// Indexed/truecolor lossless (PNG).
    Png,
    /// Modern lossy container (WebP in RIFF).
    WebP,
    /// Too short, or no known signature.
    Unknown,
}

impl PhotoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoFormat::Jpeg => "jpeg",
            PhotoFormat::Png => "png",
            PhotoFormat::WebP => "webp",
            PhotoFormat::Unknown => "unknown",
        }
    }

    /// MIME type to declare when sending the bytes to a remote service.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            PhotoFormat::Jpeg => Some("image/jpeg"),
            PhotoFormat::Png => Some("image/png"),
            PhotoFormat::WebP => Some("image/webp"),
            PhotoFormat::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PhotoFormat::Unknown)
    }

    /// The `image` crate codec used to decode this format.
    pub(crate) fn codec(&self) -> Option<image::ImageFormat> {
        match self {
            PhotoFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            PhotoFormat::Png => Some(image::ImageFormat::Png),
            PhotoFormat::WebP => Some(image::ImageFormat::WebP),
            PhotoFormat::Unknown => None,
        }
    }
}

impl std::fmt::Display for PhotoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detect the photo format from the first [`SIGNATURE_LEN`] bytes.
///
/// Anything shorter than the signature window is `Unknown`, even when the
/// available prefix would match.
pub fn detect_format(data: &[u8]) -> PhotoFormat {
    if data.len() < SIGNATURE_LEN {
        return PhotoFormat::Unknown;
    }

    if data.starts_with(&JPEG_MAGIC) {
        PhotoFormat::Jpeg
    } else if data.starts_with(&PNG_MAGIC) {
        PhotoFormat::Png
    } else if data[..4] == RIFF_MAGIC && data[8..12] == WEBP_MAGIC {
        PhotoFormat::WebP
    } else {
        PhotoFormat::Unknown
    }
}

/// An uploaded photo with its detected format and, when readable, its
/// pixel dimensions.
#[derive(Debug, Clone)]
pub struct ImageAsset<'a> {
    bytes: &'a [u8],
    format: PhotoFormat,
    dimensions: Option<(u32, u32)>,
}

impl<'a> ImageAsset<'a> {
    /// Inspect `bytes`. Only the image header is parsed for dimensions.
    pub fn new(bytes: &'a [u8]) -> Self {
        let format = detect_format(bytes);
        let dimensions = format.codec().and_then(|codec| {
            image::ImageReader::with_format(Cursor::new(bytes), codec)
                .into_dimensions()
                .ok()
        });

        Self {
            bytes,
            format,
            dimensions,
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn format(&self) -> PhotoFormat {
        self.format
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
