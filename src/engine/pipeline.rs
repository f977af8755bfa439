// src/engine/pipeline.rs
//
// The pipeline runner: a pure function of (bytes, mime, request).
// Stage order is fixed: decode -> EXIF upright -> geometry -> filter ->
// format resolution -> encode.

use crate::engine::decoder::{decode_image, detect_exif_orientation};
use crate::engine::encoder::{encode_output, OutputData};
use crate::engine::filters::{apply_filter, FilterOp};
use crate::engine::format::{resolve_format, SourceMime};
use crate::engine::geometry::{
    apply_exif_orientation, calc_target_dimensions, crop, map_crop_rect, orient, resize_surface,
};
use crate::error::{PipelineError, Result};
use crate::request::{Intent, ToolKind, TransformRequest};
use image::DynamicImage;
use log::debug;

/// Result of one pipeline run over one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub data: OutputData,
    pub mime: &'static str,
    /// Dimensions of the encoded raster.
    pub width: u32,
    pub height: u32,
    /// Payload size in bytes (or characters for text output).
    pub size: usize,
}

fn apply_geometry(img: DynamicImage, request: &TransformRequest) -> Result<DynamicImage> {
    match request.tool {
        ToolKind::Resizer | ToolKind::Enlarger => {
            let (w, h) = calc_target_dimensions(
                img.width(),
                img.height(),
                request.width,
                request.height,
                request.keep_aspect,
            )?;
            if (w, h) == (img.width(), img.height()) {
                Ok(img)
            } else {
                resize_surface(&img, w, h)
            }
        }
        ToolKind::Cropper => {
            let rect = request
                .crop
                .ok_or_else(|| PipelineError::invalid_argument("crop rectangle missing"))?;
            let display = request
                .display_size
                .ok_or_else(|| PipelineError::invalid_argument("displayed size missing"))?;
            let region = map_crop_rect(rect, display, img.width(), img.height())?;
            crop(&img, region)
        }
        ToolKind::Rotator => Ok(orient(
            img,
            request.normalized_rotation(),
            request.flip_horizontal,
            request.flip_vertical,
        )),
        ToolKind::Flipper => Ok(orient(
            img,
            0.0,
            request.flip_horizontal,
            request.flip_vertical,
        )),
        _ => Ok(img),
    }
}

/// Run the full pipeline over one in-memory file.
pub fn run_pipeline(bytes: &[u8], mime: &str, request: &TransformRequest) -> Result<PipelineOutput> {
    request.validate()?;
    let source = SourceMime::from_mime(mime)?;
    let mut img = decode_image(bytes, source)?;

    // Cameras store rotation as metadata; normalize before any geometry
    // so crop coordinates mean what the user saw.
    if request.auto_orient && source == SourceMime::Jpeg {
        if let Some(orientation) = detect_exif_orientation(bytes) {
            if orientation != 1 {
                debug!("normalizing EXIF orientation {orientation}");
                img = apply_exif_orientation(img, orientation);
            }
        }
    }

    let intent = request.tool.intent();
    if intent.contains(Intent::GEOMETRY) {
        img = apply_geometry(img, request)?;
    }
    if let ToolKind::Filter(kind) = request.tool {
        let op = FilterOp::from_request(kind, request.filter_amount, request.border_color);
        img = apply_filter(img, &op)?;
    }

    let resolved = resolve_format(&request.tool, source, request.quality);
    let encoded = encode_output(&img, &resolved)?;
    Ok(PipelineOutput {
        size: encoded.data.len(),
        data: encoded.data,
        mime: encoded.mime,
        width: encoded.width,
        height: encoded.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn compressor_rewrites_png_to_jpeg() {
        let req = TransformRequest::new(ToolKind::Compressor);
        let out = run_pipeline(&png_bytes(32, 32), "image/png", &req).unwrap();
        assert_eq!(out.mime, "image/jpeg");
        assert_eq!((out.width, out.height), (32, 32));
        assert!(out.size > 0);
    }

    #[test]
    fn rotator_quarter_turn_swaps_reported_dimensions() {
        let mut req = TransformRequest::new(ToolKind::Rotator);
        req.rotation = 90.0;
        req.quality = 100;
        let out = run_pipeline(&png_bytes(40, 20), "image/png", &req).unwrap();
        assert_eq!((out.width, out.height), (20, 40));
    }

    #[test]
    fn invalid_request_fails_before_decode() {
        let mut req = TransformRequest::new(ToolKind::Compressor);
        req.quality = 0;
        // Garbage bytes never reach the decoder.
        let err = run_pipeline(&[0u8; 4], "image/png", &req).unwrap_err();
        assert!(matches!(err, PipelineError::KnobOutOfRange { .. }));
    }

    #[test]
    fn unknown_mime_is_rejected() {
        let req = TransformRequest::new(ToolKind::Compressor);
        let err = run_pipeline(&png_bytes(4, 4), "image/tiff", &req).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }
}
