//! # Image Compression
//!
//! Downscales an image to fit within configured bounds and re-encodes it
//! as JPEG. Used when a read asks for compressed attachment content.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use super::errors::{StorageError, StorageResult};
use crate::config::CompressionConfig;

/// Re-encoded image bytes plus their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Fit `bytes` within `bounds` and encode as JPEG at `bounds.quality`.
///
/// Aspect ratio is preserved; images already inside the bounds are only
/// re-encoded.
pub fn compress_image(bytes: &[u8], bounds: &CompressionConfig) -> StorageResult<CompressedImage> {
    let img = image::load_from_memory(bytes).map_err(|e| StorageError::Image(e.to_string()))?;

    let max_width = bounds.max_width.max(1);
    let max_height = bounds.max_height.max(1);
    let img = if img.width() > max_width || img.height() > max_height {
        img.resize(max_width, max_height, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, bounds.quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| StorageError::Image(e.to_string()))?;

    Ok(CompressedImage {
        bytes: out.into_inner(),
        content_type: "image/jpeg",
        width: rgb.width(),
        height: rgb.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_downscales_within_bounds() {
        let bounds = CompressionConfig {
            max_width: 100,
            max_height: 100,
            quality: 60,
        };
        let compressed = compress_image(&png(400, 200), &bounds).unwrap();

        assert_eq!(compressed.content_type, "image/jpeg");
        assert_eq!((compressed.width, compressed.height), (100, 50));
        assert_eq!(image::guess_format(&compressed.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_small_image_keeps_size() {
        let compressed = compress_image(&png(20, 10), &CompressionConfig::default()).unwrap();
        assert_eq!((compressed.width, compressed.height), (20, 10));
    }

    #[test]
    fn test_non_image_fails() {
        let result = compress_image(b"not an image", &CompressionConfig::default());
        assert!(matches!(result, Err(StorageError::Image(_))));
    }
}
