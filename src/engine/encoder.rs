// src/engine/encoder.rs
//
// Encode stage: surface -> deliverable bytes or text. JPEG/WebP honor the
// quality knob directly; PNG gets a lossless oxipng pass; PNG/SVG apply
// the quality knob as a rasterization scale upstream of encoding; SVG
// output is a minimal document wrapping a base64 PNG image.

use crate::engine::format::{QualityPolicy, ResolvedFormat};
use crate::engine::geometry::resize_surface;
use crate::error::{PipelineError, Result};
use crate::request::OutputMime;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat};
use log::{debug, warn};
use std::borrow::Cow;
use std::io::Cursor;

// Always PipelineError so encode errors keep their taxonomy instead of
// collapsing into a generic failure.
type EncoderResult<T> = std::result::Result<T, PipelineError>;

/// Deliverable payload: bytes for files, text for data URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputData {
    Binary(Vec<u8>),
    Text(String),
}

impl OutputData {
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(b) => b.len(),
            Self::Text(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOutput {
    pub data: OutputData,
    pub mime: &'static str,
    /// Dimensions of the encoded raster (post rasterization-scale).
    pub width: u32,
    pub height: u32,
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> EncoderResult<Vec<u8>> {
    // JPEG has no alpha; composite-to-RGB only when needed.
    let rgb: Cow<'_, image::RgbImage> = match img {
        DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
        _ => Cow::Owned(img.to_rgb8()),
    };
    let mut buf = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
    encoder
        .encode_image(&*rgb)
        .map_err(|e| PipelineError::encode_failed("jpeg", format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage) -> EncoderResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PipelineError::encode_failed("png", format!("PNG encode failed: {e}")))?;

    // Lossless recompression; keep chunks intact.
    let mut options = oxipng::Options::from_preset(2);
    options.strip = oxipng::StripChunks::None;
    match oxipng::optimize_from_memory(&buf, &options) {
        Ok(optimized) => Ok(optimized),
        Err(e) => {
            warn!("oxipng pass failed, keeping unoptimized PNG: {e}");
            Ok(buf)
        }
    }
}

fn encode_webp(img: &DynamicImage, quality: u8) -> EncoderResult<Vec<u8>> {
    // Filters can introduce alpha; keep it rather than flattening.
    let rgba: Cow<'_, image::RgbaImage> = match img {
        DynamicImage::ImageRgba8(rgba_img) => Cow::Borrowed(rgba_img),
        _ => Cow::Owned(img.to_rgba8()),
    };
    let (w, h) = rgba.dimensions();
    let encoder = webp::Encoder::from_rgba(&rgba, w, h);

    let mut config = webp::WebPConfig::new()
        .map_err(|_| PipelineError::encode_failed("webp", "failed to create WebPConfig"))?;
    config.quality = f32::from(quality.min(100));
    config.method = 4;
    config.autofilter = 1;

    let mem = encoder
        .encode_advanced(&config)
        .map_err(|e| PipelineError::encode_failed("webp", format!("WebP encode failed: {e:?}")))?;
    Ok(mem.to_vec())
}

fn encode_plain(img: &DynamicImage, format: ImageFormat, name: &'static str) -> EncoderResult<Vec<u8>> {
    let mut buf = Vec::new();
    // GIF and BMP writers reject exotic sample layouts; normalize first.
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    rgba.write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| PipelineError::encode_failed(name, format!("encode failed: {e}")))?;
    Ok(buf)
}

/// Minimal SVG document wrapping the raster as a base64 PNG `<image>`.
/// `logical_w`/`logical_h` are the pre-scale dimensions, so the document
/// keeps its size even when the embedded bitmap was downscaled.
fn encode_svg(scaled: &DynamicImage, logical_w: u32, logical_h: u32) -> EncoderResult<Vec<u8>> {
    let png = encode_png(scaled)?;
    let doc = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{logical_w}" height="{logical_h}" viewBox="0 0 {logical_w} {logical_h}"><image width="{logical_w}" height="{logical_h}" href="data:image/png;base64,{}"/></svg>"#,
        BASE64.encode(&png)
    );
    Ok(doc.into_bytes())
}

fn raster_bytes(img: &DynamicImage, mime: OutputMime, policy: QualityPolicy) -> EncoderResult<Vec<u8>> {
    let quality = match policy {
        QualityPolicy::Lossy(q) => q,
        _ => 80,
    };
    match mime {
        OutputMime::Jpeg => encode_jpeg(img, quality),
        OutputMime::Png => encode_png(img),
        OutputMime::Webp => encode_webp(img, quality),
        OutputMime::Gif => encode_plain(img, ImageFormat::Gif, "gif"),
        OutputMime::Bmp => encode_plain(img, ImageFormat::Bmp, "bmp"),
        OutputMime::Svg | OutputMime::Text => Err(PipelineError::encode_failed(
            "raster",
            "container is not a raster format",
        )),
    }
}

fn apply_raster_scale(img: &DynamicImage, scale: f32) -> Result<Cow<'_, DynamicImage>> {
    if scale >= 1.0 {
        return Ok(Cow::Borrowed(img));
    }
    let w = ((img.width() as f32 * scale).round() as u32).max(1);
    let h = ((img.height() as f32 * scale).round() as u32).max(1);
    Ok(Cow::Owned(resize_surface(img, w, h)?))
}

/// Encode the final surface according to the resolved format.
pub fn encode_output(img: &DynamicImage, resolved: &ResolvedFormat) -> Result<EncodedOutput> {
    let (logical_w, logical_h) = (img.width(), img.height());
    if logical_w == 0 || logical_h == 0 {
        return Err(PipelineError::ZeroAreaSurface {
            width: logical_w,
            height: logical_h,
        });
    }

    let scaled = match resolved.policy {
        QualityPolicy::RasterScale(scale) => apply_raster_scale(img, scale)?,
        _ => Cow::Borrowed(img),
    };

    let output = match resolved.mime {
        OutputMime::Svg => EncodedOutput {
            data: OutputData::Binary(encode_svg(&scaled, logical_w, logical_h)?),
            mime: OutputMime::Svg.as_str(),
            width: scaled.width(),
            height: scaled.height(),
        },
        OutputMime::Text => {
            let inner = resolved.inner.unwrap_or(OutputMime::Png);
            let bytes = raster_bytes(&scaled, inner, resolved.policy)?;
            let uri = format!("data:{};base64,{}", inner.as_str(), BASE64.encode(&bytes));
            EncodedOutput {
                data: OutputData::Text(uri),
                mime: OutputMime::Text.as_str(),
                width: scaled.width(),
                height: scaled.height(),
            }
        }
        mime => EncodedOutput {
            data: OutputData::Binary(raster_bytes(&scaled, mime, resolved.policy)?),
            mime: mime.as_str(),
            width: scaled.width(),
            height: scaled.height(),
        },
    };

    debug!(
        "encoded {}x{} surface as {} ({} bytes)",
        output.width,
        output.height,
        output.mime,
        output.data.len()
    );
    Ok(output)
}
