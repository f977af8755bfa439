// src/engine/filters.rs
//
// Photometric stage. Exactly one filter runs per request. The color
// filters reproduce the CSS filter-function matrices so the processed
// file matches what the in-browser preview showed.

use crate::engine::decoder::check_dimensions;
use crate::engine::geometry::resize_nearest;
use crate::error::Result;
use crate::request::FilterKind;
use image::{imageops, DynamicImage, Rgba, RgbaImage};

/// A filter with its knob already normalized to working units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    /// 0.0..=1.0
    Grayscale(f32),
    /// 0.0..=1.0
    Sepia(f32),
    /// 0.0..=1.0
    Invert(f32),
    /// 0.0..=2.0, 1.0 is identity
    Brightness(f32),
    /// 0.0..=2.0, 1.0 is identity
    Contrast(f32),
    /// 0.0..=2.0, 1.0 is identity
    Saturate(f32),
    /// degrees
    HueRotate(f32),
    /// 0.0..=1.0
    Opacity(f32),
    /// Gaussian sigma in pixels
    Blur(f32),
    /// block edge in pixels, >= 2
    Pixelate(u32),
    /// corner radius in pixels
    RoundCorners(f32),
    Border { width: u32, color: [u8; 4] },
    /// 0.0..=1.0 strength driving offset, softness and margin together
    Shadow(f32),
}

impl FilterOp {
    pub fn from_request(kind: FilterKind, amount: f32, border_color: [u8; 4]) -> Self {
        match kind {
            FilterKind::Grayscale => Self::Grayscale(amount / 100.0),
            FilterKind::Sepia => Self::Sepia(amount / 100.0),
            FilterKind::Invert => Self::Invert(amount / 100.0),
            FilterKind::Brightness => Self::Brightness(amount / 100.0),
            FilterKind::Contrast => Self::Contrast(amount / 100.0),
            FilterKind::Saturate => Self::Saturate(amount / 100.0),
            FilterKind::HueRotate => Self::HueRotate(amount),
            FilterKind::Opacity => Self::Opacity(amount / 100.0),
            FilterKind::Blur => Self::Blur(amount),
            FilterKind::Pixelate => Self::Pixelate(amount.round().max(2.0) as u32),
            FilterKind::RoundCorners => Self::RoundCorners(amount),
            FilterKind::Border => Self::Border {
                width: amount.round().max(1.0) as u32,
                color: border_color,
            },
            FilterKind::Shadow => Self::Shadow(amount / 100.0),
        }
    }
}

/// 3x3 color matrix applied to RGB, alpha untouched.
fn apply_matrix(mut img: RgbaImage, m: [[f32; 3]; 3]) -> RgbaImage {
    for px in img.pixels_mut() {
        let [r, g, b, a] = px.0;
        let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
        px.0 = [
            (m[0][0] * rf + m[0][1] * gf + m[0][2] * bf).round().clamp(0.0, 255.0) as u8,
            (m[1][0] * rf + m[1][1] * gf + m[1][2] * bf).round().clamp(0.0, 255.0) as u8,
            (m[2][0] * rf + m[2][1] * gf + m[2][2] * bf).round().clamp(0.0, 255.0) as u8,
            a,
        ];
    }
    img
}

// Matrices below follow the CSS Filter Effects spec, with t = 1 - amount
// for the interpolated shorthand filters.

fn grayscale_matrix(amount: f32) -> [[f32; 3]; 3] {
    let t = 1.0 - amount;
    [
        [0.2126 + 0.7874 * t, 0.7152 - 0.7152 * t, 0.0722 - 0.0722 * t],
        [0.2126 - 0.2126 * t, 0.7152 + 0.2848 * t, 0.0722 - 0.0722 * t],
        [0.2126 - 0.2126 * t, 0.7152 - 0.7152 * t, 0.0722 + 0.9278 * t],
    ]
}

fn sepia_matrix(amount: f32) -> [[f32; 3]; 3] {
    let t = 1.0 - amount;
    [
        [0.393 + 0.607 * t, 0.769 - 0.769 * t, 0.189 - 0.189 * t],
        [0.349 - 0.349 * t, 0.686 + 0.314 * t, 0.168 - 0.168 * t],
        [0.272 - 0.272 * t, 0.534 - 0.534 * t, 0.131 + 0.869 * t],
    ]
}

fn saturate_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn hue_rotate_matrix(degrees: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

fn invert(mut img: RgbaImage, amount: f32) -> RgbaImage {
    for px in img.pixels_mut() {
        for c in &mut px.0[..3] {
            let v = f32::from(*c);
            *c = (v * (1.0 - amount) + (255.0 - v) * amount).round() as u8;
        }
    }
    img
}

fn brightness(mut img: RgbaImage, factor: f32) -> RgbaImage {
    for px in img.pixels_mut() {
        for c in &mut px.0[..3] {
            *c = (f32::from(*c) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    img
}

fn contrast(mut img: RgbaImage, factor: f32) -> RgbaImage {
    let intercept = 127.5 * (1.0 - factor);
    for px in img.pixels_mut() {
        for c in &mut px.0[..3] {
            *c = (f32::from(*c) * factor + intercept).round().clamp(0.0, 255.0) as u8;
        }
    }
    img
}

fn opacity(mut img: RgbaImage, amount: f32) -> RgbaImage {
    for px in img.pixels_mut() {
        px.0[3] = (f32::from(px.0[3]) * amount).round().clamp(0.0, 255.0) as u8;
    }
    img
}

fn pixelate(img: &DynamicImage, block: u32) -> Result<DynamicImage> {
    let (w, h) = (img.width(), img.height());
    let small_w = (w / block).max(1);
    let small_h = (h / block).max(1);
    let small = resize_nearest(img, small_w, small_h)?;
    resize_nearest(&small, w, h)
}

fn round_corners(mut img: RgbaImage, radius: f32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let radius = radius.min(w as f32 / 2.0).min(h as f32 / 2.0);
    if radius <= 0.0 {
        return img;
    }
    // Circle centers of the four corner arcs.
    let centers = [
        (radius, radius),
        (w as f32 - radius, radius),
        (radius, h as f32 - radius),
        (w as f32 - radius, h as f32 - radius),
    ];
    for (x, y, px) in img.enumerate_pixels_mut() {
        let fx = x as f32 + 0.5;
        let fy = y as f32 + 0.5;
        let in_corner_band = (fx < radius || fx > w as f32 - radius)
            && (fy < radius || fy > h as f32 - radius);
        if !in_corner_band {
            continue;
        }
        let (cx, cy) = centers
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = (fx - a.0).powi(2) + (fy - a.1).powi(2);
                let db = (fx - b.0).powi(2) + (fy - b.1).powi(2);
                da.total_cmp(&db)
            })
            .unwrap_or(centers[0]);
        let dist = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
        // Half-pixel feather keeps the arc from aliasing hard.
        let coverage = (radius - dist + 0.5).clamp(0.0, 1.0);
        px.0[3] = (f32::from(px.0[3]) * coverage).round() as u8;
    }
    img
}

fn border(img: &DynamicImage, width: u32, color: [u8; 4]) -> Result<DynamicImage> {
    let new_w = img.width() + width * 2;
    let new_h = img.height() + width * 2;
    check_dimensions(new_w, new_h)?;
    let mut canvas = RgbaImage::from_pixel(new_w, new_h, Rgba(color));
    imageops::overlay(&mut canvas, &img.to_rgba8(), i64::from(width), i64::from(width));
    Ok(DynamicImage::ImageRgba8(canvas))
}

fn shadow(img: &DynamicImage, strength: f32) -> Result<DynamicImage> {
    if strength <= 0.0 {
        return Ok(img.clone());
    }
    let sigma = strength * 12.0;
    let offset = (strength * 8.0).round() as u32;
    let margin = offset + (sigma * 3.0).ceil() as u32;

    let src = img.to_rgba8();
    let (w, h) = src.dimensions();
    let new_w = w + margin * 2;
    let new_h = h + margin * 2;
    check_dimensions(new_w, new_h)?;

    // Silhouette: source alpha at half strength, colored black, offset
    // down-right, then softened.
    let mut silhouette = RgbaImage::new(new_w, new_h);
    for (x, y, px) in src.enumerate_pixels() {
        let a = (f32::from(px.0[3]) * 0.5).round() as u8;
        silhouette.put_pixel(x + margin + offset, y + margin + offset, Rgba([0, 0, 0, a]));
    }
    let mut canvas = imageops::blur(&silhouette, sigma);
    imageops::overlay(&mut canvas, &src, i64::from(margin), i64::from(margin));
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Apply one filter to the surface.
pub fn apply_filter(img: DynamicImage, op: &FilterOp) -> Result<DynamicImage> {
    let out = match *op {
        FilterOp::Grayscale(a) => {
            DynamicImage::ImageRgba8(apply_matrix(img.into_rgba8(), grayscale_matrix(a)))
        }
        FilterOp::Sepia(a) => {
            DynamicImage::ImageRgba8(apply_matrix(img.into_rgba8(), sepia_matrix(a)))
        }
        FilterOp::Saturate(s) => {
            DynamicImage::ImageRgba8(apply_matrix(img.into_rgba8(), saturate_matrix(s)))
        }
        FilterOp::HueRotate(deg) => {
            DynamicImage::ImageRgba8(apply_matrix(img.into_rgba8(), hue_rotate_matrix(deg)))
        }
        FilterOp::Invert(a) => DynamicImage::ImageRgba8(invert(img.into_rgba8(), a)),
        FilterOp::Brightness(f) => DynamicImage::ImageRgba8(brightness(img.into_rgba8(), f)),
        FilterOp::Contrast(f) => DynamicImage::ImageRgba8(contrast(img.into_rgba8(), f)),
        FilterOp::Opacity(a) => DynamicImage::ImageRgba8(opacity(img.into_rgba8(), a)),
        FilterOp::Blur(sigma) => {
            if sigma <= 0.0 {
                img
            } else {
                DynamicImage::ImageRgba8(imageops::blur(&img.into_rgba8(), sigma))
            }
        }
        FilterOp::Pixelate(block) => pixelate(&img, block)?,
        FilterOp::RoundCorners(radius) => {
            DynamicImage::ImageRgba8(round_corners(img.into_rgba8(), radius))
        }
        FilterOp::Border { width, color } => border(&img, width, color)?,
        FilterOp::Shadow(strength) => shadow(&img, strength)?,
    };
    Ok(out)
}
