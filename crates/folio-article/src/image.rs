//! Lead image decoding and layout.

use std::io::Cursor;

use folio_types::error::{FolioError, Result};
use ::image::{ImageReader, Limits};

/// Horizontal inset of the lead image inside its container. The narrow
/// image inset is disabled, so this is always zero.
pub const LEAD_IMAGE_MARGIN: u32 = 0;

/// Decoded image data (RGBA pixels).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel.
    pub pixels: Vec<u8>,
}

/// Largest accepted width or height, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Largest allocation a single decode may make.
const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

/// Decode an image from raw bytes into RGBA.
///
/// The format is sniffed from the data. JPEG, PNG, GIF and WebP are
/// supported; anything larger than [`MAX_IMAGE_DIMENSION`] on either
/// side is rejected before pixel data is allocated.
pub fn decode_image(data: &[u8]) -> Result<DecodedImage> {
    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| FolioError::ImageLoad(format!("reading image: {e}")))?;
    if reader.format().is_none() {
        return Err(FolioError::ImageLoad("unrecognized image format".to_string()));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    reader.limits(limits);

    let rgba = reader
        .decode()
        .map_err(|e| FolioError::ImageLoad(e.to_string()))?
        .to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Frame of the lead image inside its container, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadImageFrame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Lay out the lead image across the full container width at the
/// configured height.
pub fn layout_lead_image(container_width: u32, lead_image_height: u32) -> LeadImageFrame {
    LeadImageFrame {
        x: LEAD_IMAGE_MARGIN,
        y: 0,
        width: container_width.saturating_sub(2 * LEAD_IMAGE_MARGIN),
        height: lead_image_height,
    }
}

/// Encode a solid-color RGBA PNG, for tests that need real image bytes.
#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = ::image::RgbaImage::from_pixel(width, height, ::image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ::image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = ::image::RgbImage::from_pixel(width, height, ::image::Rgb([120, 60, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ::image::ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_png_rgba() {
        let bytes = encode_test_png(3, 2, [10, 20, 30, 255]);
        let img = decode_image(&bytes).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.pixels.len(), 3 * 2 * 4);
        assert_eq!(&img.pixels[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn decode_jpeg_to_opaque_rgba() {
        let img = decode_image(&encode_jpeg(16, 8)).unwrap();
        assert_eq!((img.width, img.height), (16, 8));
        assert_eq!(img.pixels.len(), 16 * 8 * 4);
        assert!(img.pixels.chunks_exact(4).all(|p| p[3] == 255));
    }

    #[test]
    fn truncated_jpeg_fails() {
        let mut bytes = encode_jpeg(16, 16);
        bytes.truncate(20);
        assert!(matches!(decode_image(&bytes), Err(FolioError::ImageLoad(_))));
    }

    #[test]
    fn oversized_image_is_rejected() {
        let bytes = encode_test_png(MAX_IMAGE_DIMENSION + 1, 1, [0, 0, 0, 255]);
        assert!(matches!(decode_image(&bytes), Err(FolioError::ImageLoad(_))));
    }

    #[test]
    fn unknown_bytes_fail() {
        let err = decode_image(b"not an image at all").unwrap_err();
        assert!(matches!(err, FolioError::ImageLoad(_)));
    }

    #[test]
    fn garbage_png_fails() {
        let err = decode_image(&[0x89, 0x50, 0x4E, 0x47, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, FolioError::ImageLoad(_)));
    }

    #[test]
    fn layout_spans_container_with_zero_margin() {
        let frame = layout_lead_image(375, 210);
        assert_eq!(
            frame,
            LeadImageFrame {
                x: 0,
                y: 0,
                width: 375,
                height: 210
            }
        );
    }
}
