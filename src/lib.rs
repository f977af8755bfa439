// lib.rs
//
// imagetoolbox: the processing core behind a collection of in-browser
// image tools (compressor, resizer, cropper, rotator, filters, format
// converters and a base64 encoder).
//
// Design goals:
// - Buffer in, buffer out: no filesystem, no network
// - One pure pipeline function per file, batch orchestration on top
// - Output identical to what the live preview showed

pub mod engine;
pub mod error;
pub mod request;

pub use engine::{
    decode_image, encode_output, inspect_header, pack_archive, resolve_format, run_pipeline,
    suggested_filename, ArchiveEntry, Batch, BatchDeliverable, BatchOutcome, BatchSnapshot,
    EncodedOutput, FileStatus, HeaderInfo, OutputData, PipelineOutput, PreviewFrame,
    PreviewScheduler, QualityPolicy, ResolvedFormat, SourceFile, SourceMime,
};
pub use error::{ErrorKind, PipelineError, Result};
pub use request::{
    CropRect, DisplaySize, FilterKind, Intent, OutputMime, ToolKind, TransformRequest,
};

/// Library version, surfaced to the web layer's about dialog.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// MIME types the decode stage accepts.
pub fn supported_input_mimes() -> &'static [&'static str] {
    &[
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "image/bmp",
        "image/svg+xml",
    ]
}

/// MIME types the encode stage can produce.
pub fn supported_output_mimes() -> &'static [&'static str] {
    &[
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "image/bmp",
        "image/svg+xml",
        "text/plain",
    ]
}
