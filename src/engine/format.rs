// src/engine/format.rs
//
// Format resolution policy: a total function from (tool, source mime,
// quality) to how the result gets encoded. Keeping this a pure table makes
// the web layer's behavior predictable for every tool/format pairing.

use crate::error::{PipelineError, Result};
use crate::request::{OutputMime, ToolKind};
use image::ImageFormat;

/// Input container formats the decoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceMime {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
    Svg,
}

impl SourceMime {
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "image/webp" => Ok(Self::Webp),
            "image/gif" => Ok(Self::Gif),
            "image/bmp" | "image/x-ms-bmp" => Ok(Self::Bmp),
            "image/svg+xml" => Ok(Self::Svg),
            other => Err(PipelineError::unsupported_format(other.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Svg => "image/svg+xml",
        }
    }

    /// The image-crate format for raster sources; None for SVG.
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self {
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::Png => Some(ImageFormat::Png),
            Self::Webp => Some(ImageFormat::WebP),
            Self::Gif => Some(ImageFormat::Gif),
            Self::Bmp => Some(ImageFormat::Bmp),
            Self::Svg => None,
        }
    }

    /// The output container that keeps this source's format.
    fn keep(&self) -> OutputMime {
        match self {
            Self::Jpeg => OutputMime::Jpeg,
            Self::Png => OutputMime::Png,
            Self::Webp => OutputMime::Webp,
            Self::Gif => OutputMime::Gif,
            Self::Bmp => OutputMime::Bmp,
            Self::Svg => OutputMime::Svg,
        }
    }
}

/// How the quality knob applies to the resolved output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityPolicy {
    /// Encoder quality 1..=100 (JPEG, WebP).
    Lossy(u8),
    /// Lossless container with no quality knob; the knob is reinterpreted
    /// as a pre-encode rasterization scale (PNG, SVG).
    RasterScale(f32),
    /// Lossless container, knob ignored (GIF, BMP).
    Lossless,
}

/// Output container, quality interpretation, and the raster container
/// embedded inside text output when the deliverable is a data URI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFormat {
    pub mime: OutputMime,
    pub policy: QualityPolicy,
    pub inner: Option<OutputMime>,
}

/// Quality knob reinterpreted as a rasterization scale for containers
/// without a lossy quality setting. 100 keeps the size, 10 and below
/// clamp to a tenth per axis.
pub fn rasterization_scale_for_quality(quality: u8) -> f32 {
    (f32::from(quality) / 100.0).max(0.1)
}

fn policy_for(mime: OutputMime, quality: u8) -> QualityPolicy {
    match mime {
        OutputMime::Jpeg | OutputMime::Webp => QualityPolicy::Lossy(quality),
        OutputMime::Png | OutputMime::Svg => {
            QualityPolicy::RasterScale(rasterization_scale_for_quality(quality))
        }
        OutputMime::Gif | OutputMime::Bmp | OutputMime::Text => QualityPolicy::Lossless,
    }
}

fn data_uri_inner(source: SourceMime, quality: u8) -> (OutputMime, QualityPolicy) {
    match source {
        SourceMime::Jpeg => (OutputMime::Jpeg, QualityPolicy::Lossy(quality)),
        SourceMime::Webp => (OutputMime::Webp, QualityPolicy::Lossy(quality)),
        SourceMime::Png => (OutputMime::Png, QualityPolicy::Lossless),
        SourceMime::Gif => (OutputMime::Gif, QualityPolicy::Lossless),
        SourceMime::Bmp => (OutputMime::Bmp, QualityPolicy::Lossless),
        // The surface is raster by encode time; PNG keeps its alpha.
        SourceMime::Svg => (OutputMime::Png, QualityPolicy::Lossless),
    }
}

/// Total resolution function. Every (tool, source, quality) combination
/// yields an encodable format; there is no error path here.
pub fn resolve_format(tool: &ToolKind, source: SourceMime, quality: u8) -> ResolvedFormat {
    match tool {
        // Converters force their target regardless of quality.
        ToolKind::Convert(OutputMime::Text) | ToolKind::ToBase64 => {
            let (inner, policy) = data_uri_inner(source, quality);
            ResolvedFormat {
                mime: OutputMime::Text,
                policy,
                inner: Some(inner),
            }
        }
        ToolKind::Convert(target) => ResolvedFormat {
            mime: *target,
            policy: policy_for(*target, quality),
            inner: None,
        },
        // The compressor rewrites formats without a usable quality knob to
        // JPEG and leaves natively lossy formats alone.
        ToolKind::Compressor => {
            let mime = match source {
                SourceMime::Webp => OutputMime::Webp,
                SourceMime::Jpeg
                | SourceMime::Png
                | SourceMime::Svg
                | SourceMime::Gif
                | SourceMime::Bmp => OutputMime::Jpeg,
            };
            ResolvedFormat {
                mime,
                policy: QualityPolicy::Lossy(quality),
                inner: None,
            }
        }
        // Everything else keeps the source container.
        _ => {
            let mime = source.keep();
            ResolvedFormat {
                mime,
                policy: policy_for(mime, quality),
                inner: None,
            }
        }
    }
}
