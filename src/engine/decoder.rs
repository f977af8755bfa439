// src/engine/decoder.rs
//
// Decode stage: bytes + declared MIME -> RGBA-capable surface.
// Raster formats go through the image crate, SVG through resvg.

use crate::engine::format::SourceMime;
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::PipelineError;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use log::{debug, warn};
use resvg::{tiny_skia, usvg};
use std::io::Cursor;

// Decode errors keep their taxonomy (Decode vs Limit) instead of
// collapsing into a generic failure.
type DecoderResult<T> = std::result::Result<T, PipelineError>;

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PipelineError::DimensionTooLarge {
            dimension: width.max(height),
            max: MAX_DIMENSION,
        });
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(PipelineError::PixelCountTooLarge {
            pixels,
            max: MAX_PIXELS,
        });
    }
    Ok(())
}

/// Probe the header and reject oversized images before a full decode.
fn ensure_dimensions_safe(bytes: &[u8]) -> DecoderResult<()> {
    let cursor = Cursor::new(bytes);
    if let Ok(reader) = ImageReader::new(cursor).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return check_dimensions(width, height);
        }
    }
    Ok(())
}

fn decode_raster(bytes: &[u8]) -> DecoderResult<DynamicImage> {
    ensure_dimensions_safe(bytes)?;
    let img = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::decode_failed(format!("decode failed: {e}")))?;
    check_dimensions(img.width(), img.height())?;
    Ok(img)
}

/// Rasterize an SVG document at its intrinsic size. The quality knob never
/// changes the decode size; downscaling happens at encode time.
fn decode_svg(bytes: &[u8]) -> DecoderResult<DynamicImage> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &options)
        .map_err(|e| PipelineError::svg_rasterize_failed(format!("parse failed: {e}")))?;

    let size = tree.size();
    let width = size.width().ceil() as u32;
    let height = size.height().ceil() as u32;
    if width == 0 || height == 0 {
        return Err(PipelineError::svg_rasterize_failed(
            "document has no intrinsic size",
        ));
    }
    check_dimensions(width, height)?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| PipelineError::svg_rasterize_failed("could not allocate pixmap"))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // tiny_skia stores premultiplied RGBA; un-premultiply for the surface.
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    let img = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| PipelineError::svg_rasterize_failed("pixmap size mismatch"))?;
    Ok(DynamicImage::ImageRgba8(img))
}

/// Unified decode entrypoint:
/// - SVG goes to the vector rasterizer
/// - raster bytes are sniffed; a sniff that disagrees with the declared
///   MIME wins, since browsers mislabel pasted and renamed files
pub fn decode_image(bytes: &[u8], declared: SourceMime) -> DecoderResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(PipelineError::decode_failed("empty input buffer"));
    }
    if declared == SourceMime::Svg {
        return decode_svg(bytes);
    }

    if let Some(sniffed) = detect_format(bytes) {
        if Some(sniffed) != declared.image_format() {
            warn!(
                "declared {} but magic bytes say {:?}; trusting the bytes",
                declared.as_str(),
                sniffed
            );
        }
    }
    let img = decode_raster(bytes)?;
    debug!(
        "decoded {} bytes -> {}x{} surface",
        bytes.len(),
        img.width(),
        img.height()
    );
    Ok(img)
}

/// Width, height and container format read from the header alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub width: u32,
    pub height: u32,
    pub mime: Option<&'static str>,
}

/// Read dimensions and format from the header without a full decode.
/// Used for metadata display before any processing starts.
pub fn inspect_header(bytes: &[u8]) -> DecoderResult<HeaderInfo> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::decode_failed(format!("header probe failed: {e}")))?;
    let mime = reader.format().map(|f| f.to_mime_type());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| PipelineError::decode_failed(format!("header probe failed: {e}")))?;
    Ok(HeaderInfo {
        width,
        height,
        mime,
    })
}

/// Extract EXIF Orientation tag (1-8). Returns None if missing or invalid.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif_reader = exif::Reader::new();
    let exif = exif_reader.read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    // exif crate can represent as Short/Long; use get_uint for safety
    let value = field.value.get_uint(0)?;
    let orientation = value as u16;
    if (1..=8).contains(&orientation) {
        Some(orientation)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn decodes_png_by_declared_mime() {
        let data = encode_png(4, 3);
        let img = decode_image(&data, SourceMime::Png).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }

    #[test]
    fn sniff_wins_over_wrong_declared_mime() {
        let data = encode_png(2, 2);
        let img = decode_image(&data, SourceMime::Jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
    }

    #[test]
    fn empty_buffer_is_a_decode_error() {
        let err = decode_image(&[], SourceMime::Png).unwrap_err();
        assert!(matches!(err, PipelineError::DecodeFailed { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_image(&[0xDE, 0xAD, 0xBE, 0xEF], SourceMime::Png).unwrap_err();
        assert!(matches!(err, PipelineError::DecodeFailed { .. }));
    }

    #[test]
    fn rejects_oversized_header_before_decode() {
        let width = MAX_DIMENSION + 1;
        let data = encode_png(width, 1);
        let err = decode_image(&data, SourceMime::Png).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionTooLarge { .. }));
    }

    #[test]
    fn check_dimensions_pixel_cap() {
        assert!(check_dimensions(10_000, 10_000).is_ok());
        let err = check_dimensions(10_001, 10_000).unwrap_err();
        assert!(matches!(err, PipelineError::PixelCountTooLarge { .. }));
    }

    #[test]
    fn decodes_svg_at_intrinsic_size() {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20"><rect width="40" height="20" fill="#ff0000"/></svg>"##;
        let img = decode_image(svg, SourceMime::Svg).unwrap();
        assert_eq!((img.width(), img.height()), (40, 20));
        let rgba = img.to_rgba8();
        assert_eq!(rgba.get_pixel(5, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn malformed_svg_is_a_decode_error() {
        let err = decode_image(b"<svg", SourceMime::Svg).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Decode);
    }

    #[test]
    fn inspect_header_reads_dimensions_without_decode() {
        let data = encode_png(17, 9);
        let info = inspect_header(&data).unwrap();
        assert_eq!((info.width, info.height), (17, 9));
        assert_eq!(info.mime, Some("image/png"));
    }

    #[test]
    fn exif_orientation_absent_on_plain_png() {
        let data = encode_png(2, 2);
        assert_eq!(detect_exif_orientation(&data), None);
    }
}
