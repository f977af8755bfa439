// src/engine/geometry.rs
//
// Geometric stage: target-dimension calculation, display->source crop
// mapping, rotation (lossless quarter turns + sampled arbitrary angles)
// and mirroring. Resampling goes through fast_image_resize with
// premultiplied alpha; transparency must not bleed at edges.

use crate::engine::decoder::check_dimensions;
use crate::error::{PipelineError, Result};
use crate::request::{CropRect, DisplaySize};
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::{DynamicImage, RgbImage, Rgba, RgbaImage};

/// Crop rectangle in source pixels, already validated against the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Resolve the target size for a resize.
///
/// Both dimensions given: used verbatim. One given with aspect-lock: the
/// other is derived from the source ratio and rounded. One given without
/// aspect-lock: the missing axis keeps the source value.
pub fn calc_target_dimensions(
    src_width: u32,
    src_height: u32,
    width: Option<u32>,
    height: Option<u32>,
    keep_aspect: bool,
) -> Result<(u32, u32)> {
    let (w, h) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            if keep_aspect {
                let ratio = src_height as f64 / src_width as f64;
                (w, ((w as f64 * ratio).round() as u32).max(1))
            } else {
                (w, src_height)
            }
        }
        (None, Some(h)) => {
            if keep_aspect {
                let ratio = src_width as f64 / src_height as f64;
                (((h as f64 * ratio).round() as u32).max(1), h)
            } else {
                (src_width, h)
            }
        }
        (None, None) => (src_width, src_height),
    };

    if w == 0 || h == 0 {
        return Err(PipelineError::InvalidResizeDimensions {
            width: w,
            height: h,
        });
    }
    check_dimensions(w, h)?;
    Ok((w, h))
}

/// Map a crop rectangle from display coordinates to source pixels using
/// the natural/display ratio, clamping to the surface.
pub fn map_crop_rect(
    rect: CropRect,
    display: DisplaySize,
    src_width: u32,
    src_height: u32,
) -> Result<CropRegion> {
    let rx = src_width as f64 / f64::from(display.width);
    let ry = src_height as f64 / f64::from(display.height);

    let raw_x = f64::from(rect.x) * rx;
    let raw_y = f64::from(rect.y) * ry;
    // Selection widgets can report slightly negative origins on fast
    // drags; the off-surface part of the rect is cut, not shifted.
    let x = raw_x.round().max(0.0) as u32;
    let y = raw_y.round().max(0.0) as u32;
    let width_f = f64::from(rect.width) * rx + raw_x.min(0.0);
    let height_f = f64::from(rect.height) * ry + raw_y.min(0.0);
    if x >= src_width || y >= src_height {
        return Err(PipelineError::CropOutOfBounds {
            x,
            y,
            width: width_f.round().max(0.0) as u32,
            height: height_f.round().max(0.0) as u32,
            img_width: src_width,
            img_height: src_height,
        });
    }

    let width = (width_f.round().max(0.0) as u32).min(src_width - x);
    let height = (height_f.round().max(0.0) as u32).min(src_height - y);
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyCrop);
    }

    Ok(CropRegion {
        x,
        y,
        width,
        height,
    })
}

/// Cut a validated region out of the surface.
pub fn crop(img: &DynamicImage, region: CropRegion) -> Result<DynamicImage> {
    let (img_w, img_h) = (img.width(), img.height());
    if region.width == 0 || region.height == 0 {
        return Err(PipelineError::EmptyCrop);
    }
    if u64::from(region.x) + u64::from(region.width) > u64::from(img_w)
        || u64::from(region.y) + u64::from(region.height) > u64::from(img_h)
    {
        return Err(PipelineError::CropOutOfBounds {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            img_width: img_w,
            img_height: img_h,
        });
    }
    Ok(img.crop_imm(region.x, region.y, region.width, region.height))
}

fn lanczos_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

fn nearest_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Nearest)
}

fn is_fully_opaque(buffer: &[u8]) -> bool {
    buffer.iter().skip(3).step_by(4).all(|&alpha| alpha == 255)
}

fn resize_impl(img: &DynamicImage, dst_w: u32, dst_h: u32, options: ResizeOptions) -> Result<DynamicImage> {
    if dst_w == 0 || dst_h == 0 {
        return Err(PipelineError::InvalidResizeDimensions {
            width: dst_w,
            height: dst_h,
        });
    }
    let (src_w, src_h) = (img.width(), img.height());

    let (pixel_type, src_pixels) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.as_raw().clone()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.as_raw().clone()),
        other => (PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    let mut src_image = fir::images::Image::from_vec_u8(src_w, src_h, src_pixels, pixel_type)
        .map_err(|e| PipelineError::resize_failed(format!("source buffer: {e}")))?;
    let mut dst_image = fir::images::Image::new(dst_w, dst_h, pixel_type);

    // Resampling straight RGBA bleeds the colors of transparent pixels.
    let needs_premultiply =
        pixel_type == PixelType::U8x4 && !is_fully_opaque(src_image.buffer());
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| PipelineError::resize_failed(format!("premultiply: {e}")))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| PipelineError::resize_failed(format!("resample: {e:?}")))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| PipelineError::resize_failed(format!("unpremultiply: {e}")))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_w, dst_h, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| PipelineError::resize_failed("rgb output buffer mismatch")),
        _ => RgbaImage::from_raw(dst_w, dst_h, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| PipelineError::resize_failed("rgba output buffer mismatch")),
    }
}

/// High-quality Lanczos3 resample to an exact target size.
pub fn resize_surface(img: &DynamicImage, dst_w: u32, dst_h: u32) -> Result<DynamicImage> {
    resize_impl(img, dst_w, dst_h, lanczos_options())
}

/// Nearest-neighbor resample. Used by pixelation, where blocky is the point.
pub(crate) fn resize_nearest(img: &DynamicImage, dst_w: u32, dst_h: u32) -> Result<DynamicImage> {
    resize_impl(img, dst_w, dst_h, nearest_options())
}

fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let clamp = |ix: f32, iy: f32| -> &Rgba<u8> {
        let cx = (ix.max(0.0) as u32).min(w - 1);
        let cy = (iy.max(0.0) as u32).min(h - 1);
        img.get_pixel(cx, cy)
    };

    let p00 = clamp(x0, y0);
    let p10 = clamp(x0 + 1.0, y0);
    let p01 = clamp(x0, y0 + 1.0);
    let p11 = clamp(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        let top = f32::from(p00.0[i]) * (1.0 - fx) + f32::from(p10.0[i]) * fx;
        let bottom = f32::from(p01.0[i]) * (1.0 - fx) + f32::from(p11.0[i]) * fx;
        *channel = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Rotate by an arbitrary angle (degrees, clockwise) into a canvas of the
/// same size. Corners clip; uncovered pixels stay transparent.
fn rotate_arbitrary(img: &DynamicImage, degrees: f32) -> DynamicImage {
    let src = img.to_rgba8();
    let (w, h) = src.dimensions();
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let cx = w as f32 / 2.0 - 0.5;
    let cy = h as f32 / 2.0 - 0.5;

    let out = RgbaImage::from_fn(w, h, |dx, dy| {
        let rx = dx as f32 - cx;
        let ry = dy as f32 - cy;
        // Inverse mapping: rotate the destination offset back by -theta
        // (screen coordinates, y down, positive angle clockwise).
        let sx = cos * rx + sin * ry + cx;
        let sy = -sin * rx + cos * ry + cy;
        if sx < -0.5 || sy < -0.5 || sx > w as f32 - 0.5 || sy > h as f32 - 0.5 {
            Rgba([0, 0, 0, 0])
        } else {
            bilinear_sample(&src, sx, sy)
        }
    });
    DynamicImage::ImageRgba8(out)
}

/// Apply mirroring and rotation in draw order: the source is flipped
/// first, then rotated. `degrees` must already be normalized to [0, 360).
/// Quarter turns are lossless pixel shuffles; 90 and 270 swap dimensions.
pub fn orient(img: DynamicImage, degrees: f32, flip_h: bool, flip_v: bool) -> DynamicImage {
    let img = if flip_h { img.fliph() } else { img };
    let img = if flip_v { img.flipv() } else { img };

    if degrees == 0.0 {
        img
    } else if degrees == 90.0 {
        img.rotate90()
    } else if degrees == 180.0 {
        img.rotate180()
    } else if degrees == 270.0 {
        img.rotate270()
    } else {
        rotate_arbitrary(&img, degrees)
    }
}

/// Normalize a surface according to its EXIF Orientation tag (1-8).
pub(crate) fn apply_exif_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
