// src/engine.rs
//
// The core of imagetoolbox. A single-pass pipeline that:
// 1. Decodes an in-memory buffer into a surface
// 2. Applies the active tool's geometric and photometric work
// 3. Encodes according to the format resolution policy
//
// This file is a facade that delegates to the decomposed modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod archive;
mod batch;
mod decoder;
mod encoder;
mod filters;
mod format;
mod geometry;
mod pipeline;
mod preview;

pub use archive::{pack_archive, suggested_filename, ArchiveEntry};
pub use batch::{
    Batch, BatchDeliverable, BatchOutcome, BatchSnapshot, FileStatus, FileStatusRow, SourceFile,
};
pub use decoder::{
    check_dimensions, decode_image, detect_exif_orientation, inspect_header, HeaderInfo,
};
pub use encoder::{encode_output, EncodedOutput, OutputData};
pub use filters::FilterOp;
pub use format::{
    rasterization_scale_for_quality, resolve_format, QualityPolicy, ResolvedFormat, SourceMime,
};
pub use geometry::{calc_target_dimensions, crop, map_crop_rect, orient, resize_surface, CropRegion};
pub use pipeline::{run_pipeline, PipelineOutput};
pub use preview::{PreviewFrame, PreviewScheduler};
