// tests/edge_cases.rs
//
// Boundary values, malformed inputs and error-path behavior across the
// pipeline and the batch orchestrator.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imagetoolbox::{
    run_pipeline, Batch, BatchDeliverable, CropRect, DisplaySize, ErrorKind, FileStatus,
    FilterKind, PipelineError, SourceFile, ToolKind, TransformRequest,
};
use std::io::Cursor;
use std::sync::Arc;

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
fn empty_input_is_a_decode_error() {
    let req = TransformRequest::new(ToolKind::Compressor);
    let err = run_pipeline(&[], "image/png", &req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn truncated_png_is_a_decode_error() {
    let mut bytes = png_bytes(32, 32);
    bytes.truncate(20);
    let req = TransformRequest::new(ToolKind::Compressor);
    let err = run_pipeline(&bytes, "image/png", &req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn unsupported_mime_is_rejected() {
    let req = TransformRequest::new(ToolKind::Compressor);
    let err = run_pipeline(&png_bytes(4, 4), "application/pdf", &req).unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
}

#[test]
fn quality_bounds_rejected_before_work() {
    for quality in [0u8, 101, 255] {
        let mut req = TransformRequest::new(ToolKind::Compressor);
        req.quality = quality;
        let err = run_pipeline(&png_bytes(4, 4), "image/png", &req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input, "quality {quality}");
    }
}

#[test]
fn resize_to_zero_rejected() {
    let mut req = TransformRequest::new(ToolKind::Resizer);
    req.width = Some(0);
    let err = run_pipeline(&png_bytes(4, 4), "image/png", &req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn resize_beyond_dimension_cap_rejected() {
    let mut req = TransformRequest::new(ToolKind::Resizer);
    req.width = Some(40_000);
    req.keep_aspect = false;
    let err = run_pipeline(&png_bytes(4, 4), "image/png", &req).unwrap_err();
    assert!(matches!(err, PipelineError::DimensionTooLarge { .. }));
}

#[test]
fn crop_fully_outside_display_is_out_of_bounds() {
    let mut req = TransformRequest::new(ToolKind::Cropper);
    req.crop = Some(CropRect {
        x: 500.0,
        y: 0.0,
        width: 10.0,
        height: 10.0,
    });
    req.display_size = Some(DisplaySize {
        width: 100.0,
        height: 100.0,
    });
    let err = run_pipeline(&png_bytes(64, 64), "image/png", &req).unwrap_err();
    assert!(matches!(err, PipelineError::CropOutOfBounds { .. }));
}

#[test]
fn subpixel_crop_is_empty() {
    let mut req = TransformRequest::new(ToolKind::Cropper);
    req.crop = Some(CropRect {
        x: 0.0,
        y: 0.0,
        width: 0.2,
        height: 50.0,
    });
    req.display_size = Some(DisplaySize {
        width: 128.0,
        height: 128.0,
    });
    let err = run_pipeline(&png_bytes(64, 64), "image/png", &req).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyCrop));
}

#[test]
fn negative_rotation_normalizes() {
    let mut req = TransformRequest::new(ToolKind::Rotator);
    req.rotation = -90.0;
    req.quality = 100;
    let out = run_pipeline(&png_bytes(40, 20), "image/png", &req).unwrap();
    // -90 normalizes to 270: dimensions swap.
    assert_eq!((out.width, out.height), (20, 40));
}

#[test]
fn full_turn_is_identity() {
    let mut req = TransformRequest::new(ToolKind::Rotator);
    req.rotation = 360.0;
    req.quality = 100;
    let bytes = png_bytes(24, 16);
    let out = run_pipeline(&bytes, "image/png", &req).unwrap();
    assert_eq!((out.width, out.height), (24, 16));

    let imagetoolbox::OutputData::Binary(encoded) = out.data else {
        panic!("expected bytes");
    };
    let back = image::load_from_memory(&encoded).unwrap();
    let original = image::load_from_memory(&bytes).unwrap();
    assert_eq!(back.to_rgb8(), original.to_rgb8());
}

#[test]
fn pixelate_block_larger_than_image_collapses_to_one_color() {
    let mut req = TransformRequest::new(ToolKind::Filter(FilterKind::Pixelate));
    req.filter_amount = 50.0;
    req.quality = 100;
    let out = run_pipeline(&png_bytes(16, 16), "image/png", &req).unwrap();
    let imagetoolbox::OutputData::Binary(encoded) = out.data else {
        panic!("expected bytes");
    };
    let back = image::load_from_memory(&encoded).unwrap().to_rgb8();
    let first = back.get_pixel(0, 0);
    assert!(back.pixels().all(|p| p == first));
}

#[test]
fn filter_amount_out_of_range_rejected() {
    let mut req = TransformRequest::new(ToolKind::Filter(FilterKind::Blur));
    req.filter_amount = 51.0;
    let err = run_pipeline(&png_bytes(8, 8), "image/png", &req).unwrap_err();
    assert!(matches!(err, PipelineError::KnobOutOfRange { .. }));
}

#[test]
fn one_bad_file_leaves_the_rest_of_the_batch_intact() {
    let mut batch = Batch::new();
    let good_a = batch.add(SourceFile {
        name: "a.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: Arc::new(png_bytes(8, 8)),
    });
    let bad = batch.add(SourceFile {
        name: "bad.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: Arc::new(vec![1, 2, 3]),
    });
    let good_b = batch.add(SourceFile {
        name: "b.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: Arc::new(png_bytes(8, 8)),
    });

    let outcome = batch.process(&TransformRequest::new(ToolKind::Compressor), |_| {});
    assert!(batch.result(good_a).is_some());
    assert!(batch.result(good_b).is_some());
    assert!(batch.error(bad).is_some());
    assert!(matches!(outcome.deliverable, BatchDeliverable::Archive(_)));
}

#[test]
fn status_machine_settles_every_file() {
    let mut batch = Batch::new();
    batch.add(SourceFile {
        name: "a.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: Arc::new(png_bytes(4, 4)),
    });
    batch.add(SourceFile {
        name: "bad.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: Arc::new(vec![0]),
    });

    batch.process(&TransformRequest::new(ToolKind::Compressor), |_| {});
    let snap = batch.snapshot();
    assert_eq!(snap.rows[0].status, FileStatus::Done);
    assert_eq!(snap.rows[1].status, FileStatus::Error);
    assert!(snap.rows[1].error.as_deref().unwrap().contains("decode"));
}

#[test]
fn archive_failure_keeps_per_file_results() {
    // Two files, both failing: archiving has nothing to pack.
    let mut batch = Batch::new();
    let a = batch.add(SourceFile {
        name: "a.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: Arc::new(vec![1]),
    });
    let b = batch.add(SourceFile {
        name: "b.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: Arc::new(vec![2]),
    });

    let outcome = batch.process(&TransformRequest::new(ToolKind::Compressor), |_| {});
    assert!(outcome.archive_error.is_some());
    assert!(batch.error(a).is_some());
    assert!(batch.error(b).is_some());
}

#[test]
fn one_pixel_image_round_trips_every_tool() {
    let bytes = png_bytes(1, 1);
    let tools = [
        ToolKind::Compressor,
        ToolKind::Flipper,
        ToolKind::ToBase64,
        ToolKind::Filter(FilterKind::Sepia),
    ];
    for tool in tools {
        let mut req = TransformRequest::new(tool);
        req.quality = 100;
        let out = run_pipeline(&bytes, "image/png", &req).unwrap();
        assert_eq!((out.width, out.height), (1, 1), "{tool:?}");
    }
}
