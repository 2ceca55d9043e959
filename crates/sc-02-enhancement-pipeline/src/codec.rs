//! Image codec keyed by MIME type.
//!
//! Decoded images are normalised to 8-bit RGB; alpha is dropped.

use std::fmt;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};

use crate::error::MediaError;

/// JPEG encoder quality used for pipeline output.
pub const JPEG_QUALITY: u8 = 95;

/// Media types the pipeline can decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
}

impl MediaType {
    /// Resolve a MIME type string, ignoring parameters and case.
    pub fn from_mime(mime: &str) -> Result<Self, MediaError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(MediaType::Jpeg),
            "image/png" => Ok(MediaType::Png),
            _ => Err(MediaError::UnsupportedMediaType(mime.to_string())),
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Png => ImageFormat::Png,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// Decode bytes of the given media type into an RGB image.
pub fn decode(bytes: &[u8], media_type: MediaType) -> Result<RgbImage, MediaError> {
    image::load_from_memory_with_format(bytes, media_type.image_format())
        .map(|img| img.to_rgb8())
        .map_err(|e| MediaError::Decode(e.to_string()))
}

/// Encode an RGB image as the given media type.
pub fn encode(image: &RgbImage, media_type: MediaType) -> Result<Vec<u8>, MediaError> {
    let mut out = Vec::new();
    let result = match media_type {
        MediaType::Jpeg => {
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(image)
        }
        MediaType::Png => PngEncoder::new(&mut out).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        ),
    };
    result.map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(out)
}
