// src/request.rs
//
// The request model: which tool is running and with which knobs. A
// TransformRequest is a plain value; the pipeline is a pure function of
// (bytes, mime, request). Validation happens up front so every stage
// downstream can assume ranges hold.

use crate::error::{PipelineError, Result};
use bitflags::bitflags;

bitflags! {
    /// Which pipeline stages a tool touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Intent: u8 {
        const GEOMETRY = 1 << 0;
        const PHOTOMETRY = 1 << 1;
        const REENCODE = 1 << 2;
        const TEXT_OUTPUT = 1 << 3;
    }
}

/// Output container formats the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMime {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
    Svg,
    /// Base64 data URI, delivered as text rather than bytes.
    Text,
}

impl OutputMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Svg => "image/svg+xml",
            Self::Text => "text/plain",
        }
    }

    /// File extension used for downloads and archive entries.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Svg => "svg",
            Self::Text => "txt",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Ok(Self::Jpeg),
            "png" | "image/png" => Ok(Self::Png),
            "webp" | "image/webp" => Ok(Self::Webp),
            "gif" | "image/gif" => Ok(Self::Gif),
            "bmp" | "image/bmp" => Ok(Self::Bmp),
            "svg" | "image/svg+xml" => Ok(Self::Svg),
            "txt" | "text" | "text/plain" => Ok(Self::Text),
            other => Err(PipelineError::invalid_argument(format!(
                "unknown output format: {other}"
            ))),
        }
    }
}

/// Single-knob photometric filters plus the compositing decorations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Grayscale,
    Sepia,
    Invert,
    Brightness,
    Contrast,
    Saturate,
    HueRotate,
    Opacity,
    Blur,
    Pixelate,
    RoundCorners,
    Border,
    Shadow,
}

impl FilterKind {
    /// Inclusive knob range for the filter's single scalar.
    pub fn knob_range(&self) -> (f32, f32) {
        match self {
            Self::Grayscale | Self::Sepia | Self::Invert | Self::Opacity | Self::Shadow => {
                (0.0, 100.0)
            }
            Self::Brightness | Self::Contrast | Self::Saturate => (0.0, 200.0),
            Self::HueRotate => (0.0, 360.0),
            Self::Blur => (0.0, 50.0),
            Self::Pixelate => (2.0, 50.0),
            Self::RoundCorners => (0.0, 500.0),
            Self::Border => (1.0, 100.0),
        }
    }

    pub fn knob_name(&self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Sepia => "sepia",
            Self::Invert => "invert",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturate => "saturate",
            Self::HueRotate => "hue-rotate",
            Self::Opacity => "opacity",
            Self::Blur => "blur",
            Self::Pixelate => "pixelate",
            Self::RoundCorners => "round-corners",
            Self::Border => "border",
            Self::Shadow => "shadow",
        }
    }
}

/// One tool of the collection. Each request runs exactly one tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolKind {
    Compressor,
    Resizer,
    Enlarger,
    Cropper,
    Rotator,
    Flipper,
    Filter(FilterKind),
    Convert(OutputMime),
    ToBase64,
}

impl ToolKind {
    pub fn intent(&self) -> Intent {
        match self {
            Self::Compressor | Self::Convert(_) => Intent::REENCODE,
            Self::Resizer | Self::Enlarger | Self::Cropper | Self::Rotator | Self::Flipper => {
                Intent::GEOMETRY | Intent::REENCODE
            }
            Self::Filter(_) => Intent::PHOTOMETRY | Intent::REENCODE,
            Self::ToBase64 => Intent::REENCODE | Intent::TEXT_OUTPUT,
        }
    }
}

/// Crop rectangle in display coordinates, as the selection widget reports
/// it. Mapped to source pixels by the geometric stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Size at which the image was displayed when the crop was drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub tool: ToolKind,
    /// 1..=100. For PNG/SVG outputs this becomes a rasterization scale.
    pub quality: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub keep_aspect: bool,
    /// Degrees, any finite value; normalized into [0, 360) when applied.
    pub rotation: f32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub crop: Option<CropRect>,
    pub display_size: Option<DisplaySize>,
    /// The single scalar knob of the active filter.
    pub filter_amount: f32,
    /// RGBA, used by the border filter.
    pub border_color: [u8; 4],
    pub auto_orient: bool,
}

impl TransformRequest {
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            quality: 80,
            width: None,
            height: None,
            keep_aspect: true,
            rotation: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            crop: None,
            display_size: None,
            filter_amount: 100.0,
            border_color: [0, 0, 0, 255],
            auto_orient: true,
        }
    }

    /// Rotation normalized into [0, 360).
    pub fn normalized_rotation(&self) -> f32 {
        self.rotation.rem_euclid(360.0)
    }

    /// Checks every knob the active tool reads. Returns the first
    /// violation; a valid request passes every stage's preconditions.
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(PipelineError::KnobOutOfRange {
                knob: "quality",
                value: f64::from(self.quality),
                expected: "1..=100",
            });
        }

        match self.tool {
            ToolKind::Resizer | ToolKind::Enlarger => {
                if self.width.is_none() && self.height.is_none() {
                    return Err(PipelineError::invalid_argument(
                        "resize requires at least one target dimension",
                    ));
                }
                for (name, dim) in [("width", self.width), ("height", self.height)] {
                    if dim == Some(0) {
                        return Err(PipelineError::KnobOutOfRange {
                            knob: name,
                            value: 0.0,
                            expected: "a positive pixel count",
                        });
                    }
                }
            }
            ToolKind::Cropper => {
                let rect = self.crop.ok_or_else(|| {
                    PipelineError::invalid_argument("crop requires a selection rectangle")
                })?;
                let display = self.display_size.ok_or_else(|| {
                    PipelineError::invalid_argument("crop requires the displayed size")
                })?;
                if !(rect.width > 0.0 && rect.height > 0.0) {
                    return Err(PipelineError::EmptyCrop);
                }
                if !(display.width > 0.0 && display.height > 0.0) {
                    return Err(PipelineError::invalid_argument(
                        "displayed size must be positive",
                    ));
                }
            }
            ToolKind::Rotator => {
                if !self.rotation.is_finite() {
                    return Err(PipelineError::KnobOutOfRange {
                        knob: "rotation",
                        value: f64::from(self.rotation),
                        expected: "a finite angle in degrees",
                    });
                }
            }
            ToolKind::Filter(kind) => {
                let (lo, hi) = kind.knob_range();
                if !self.filter_amount.is_finite()
                    || self.filter_amount < lo
                    || self.filter_amount > hi
                {
                    return Err(PipelineError::KnobOutOfRange {
                        knob: kind.knob_name(),
                        value: f64::from(self.filter_amount),
                        expected: match kind {
                            FilterKind::Brightness | FilterKind::Contrast | FilterKind::Saturate => {
                                "0..=200"
                            }
                            FilterKind::HueRotate => "0..=360",
                            FilterKind::Blur => "0..=50",
                            FilterKind::Pixelate => "2..=50",
                            FilterKind::RoundCorners => "0..=500",
                            FilterKind::Border => "1..=100",
                            _ => "0..=100",
                        },
                    });
                }
            }
            ToolKind::Convert(OutputMime::Text) => {
                return Err(PipelineError::invalid_argument(
                    "use the base64 tool for text output",
                ));
            }
            ToolKind::Compressor
            | ToolKind::Flipper
            | ToolKind::Convert(_)
            | ToolKind::ToBase64 => {}
        }

        Ok(())
    }
}
