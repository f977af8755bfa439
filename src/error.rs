// src/error.rs
//
// Unified error handling for imagetoolbox.
//
// Error taxonomy (ErrorKind):
// - Decode: the input bytes could not become a surface
// - Limit: decompression-bomb guards tripped
// - Geometric: resize/crop/rotate rejected the request
// - Input: request validation (knob ranges, malformed arguments)
// - Encode: the output bytes could not be produced
// - Archive: batch packaging failed (per-file results stay intact)

use std::borrow::Cow;
use thiserror::Error;

/// Unified error type for the whole pipeline.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Unsupported input format: {mime}")]
    UnsupportedFormat { mime: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Failed to rasterize SVG: {message}")]
    SvgRasterizeFailed { message: Cow<'static, str> },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionTooLarge { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountTooLarge { pixels: u64, max: u64 },

    #[error("Invalid resize dimensions: {width}x{height}")]
    InvalidResizeDimensions { width: u32, height: u32 },

    #[error(
        "Crop rectangle ({x}, {y}, {width}x{height}) exceeds image bounds {img_width}x{img_height}"
    )]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Crop rectangle has zero area after mapping to source pixels")]
    EmptyCrop,

    #[error("Resize operation failed: {message}")]
    ResizeFailed { message: Cow<'static, str> },

    #[error("Invalid value for {knob}: {value} (expected {expected})")]
    KnobOutOfRange {
        knob: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: Cow<'static, str> },

    #[error("Cannot encode zero-area surface ({width}x{height})")]
    ZeroAreaSurface { width: u32, height: u32 },

    #[error("Failed to encode {format}: {message}")]
    EncodeFailed {
        format: &'static str,
        message: Cow<'static, str>,
    },

    #[error("Failed to build archive: {message}")]
    ArchiveFailed { message: Cow<'static, str> },

    #[error("No successful results to archive")]
    EmptyArchive,
}

/// Coarse classification of where in the pipeline an error originated.
/// Callers use this to pick which surface of the UI the message lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Limit,
    Geometric,
    Input,
    Encode,
    Archive,
}

impl PipelineError {
    pub fn unsupported_format(mime: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat { mime: mime.into() }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn svg_rasterize_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::SvgRasterizeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self::EncodeFailed {
            format,
            message: message.into(),
        }
    }

    pub fn archive_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::ArchiveFailed {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::SvgRasterizeFailed { .. } => ErrorKind::Decode,
            Self::DimensionTooLarge { .. } | Self::PixelCountTooLarge { .. } => ErrorKind::Limit,
            Self::InvalidResizeDimensions { .. }
            | Self::CropOutOfBounds { .. }
            | Self::EmptyCrop
            | Self::ResizeFailed { .. } => ErrorKind::Geometric,
            Self::KnobOutOfRange { .. } | Self::InvalidArgument { .. } => ErrorKind::Input,
            Self::ZeroAreaSurface { .. } | Self::EncodeFailed { .. } => ErrorKind::Encode,
            Self::ArchiveFailed { .. } | Self::EmptyArchive => ErrorKind::Archive,
        }
    }

    /// Whether the failure is attributable to a single input. Per-file
    /// errors in a batch are recorded and never abort the batch.
    pub fn is_per_file(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Archive)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = PipelineError::decode_failed("truncated stream");
        assert_eq!(err.to_string(), "Failed to decode image: truncated stream");

        let err = PipelineError::CropOutOfBounds {
            x: 10,
            y: 20,
            width: 100,
            height: 100,
            img_width: 64,
            img_height: 64,
        };
        let msg = err.to_string();
        assert!(msg.contains("(10, 20, 100x100)"));
        assert!(msg.contains("64x64"));
    }

    #[test]
    fn kinds_match_origin() {
        assert_eq!(
            PipelineError::unsupported_format("image/tiff").kind(),
            ErrorKind::Decode
        );
        assert_eq!(
            PipelineError::DimensionTooLarge {
                dimension: 50_000,
                max: 32_768
            }
            .kind(),
            ErrorKind::Limit
        );
        assert_eq!(PipelineError::EmptyCrop.kind(), ErrorKind::Geometric);
        assert_eq!(
            PipelineError::encode_failed("png", "writer error").kind(),
            ErrorKind::Encode
        );
        assert_eq!(PipelineError::EmptyArchive.kind(), ErrorKind::Archive);
    }

    #[test]
    fn archive_errors_are_not_per_file() {
        assert!(PipelineError::decode_failed("x").is_per_file());
        assert!(!PipelineError::EmptyArchive.is_per_file());
    }
}
