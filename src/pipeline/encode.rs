//! Image encoding: raster → JPEG for cover leaves, PNG for thumbnails and
//! previews.
//!
//! Cover leaves embed JPEG because PDF readers decode `DCTDecode` natively and
//! a full-page photo at 300 DPI stays a few hundred kilobytes. Everything the
//! user saves to disk as a standalone picture is PNG.

use crate::error::CoverError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode an RGB raster as baseline JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, CoverError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| CoverError::RenderFailed {
            detail: format!("JPEG encoding failed: {e}"),
        })?;
    debug!(
        "Encoded {}x{} raster → {} bytes JPEG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Encode any image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, CoverError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CoverError::Internal(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    #[test]
    fn jpeg_has_soi_marker() {
        let img = RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]));
        let data = encode_jpeg(&img, 90).expect("encode should succeed");
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn jpeg_is_deterministic() {
        let img = RgbImage::from_fn(32, 24, |x, y| Rgb([x as u8 * 7, y as u8 * 9, 42]));
        assert_eq!(encode_jpeg(&img, 85).unwrap(), encode_jpeg(&img, 85).unwrap());
    }

    #[test]
    fn png_encodes_rgba() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_png(&img).unwrap();
        assert_eq!(&data[1..4], b"PNG");
    }
}
