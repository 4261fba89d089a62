// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end pipeline tests with fake detection and OCR services

use super::common::{grids, white_image, FakeOcr, SlowDetection};
use fabstir_text_scan::config::ScanConfig;
use fabstir_text_scan::vision::detection::{
    prepare_image, DetectionOutput, PrecomputedDetection, TensorLayout, TextBox,
    TextDetectionModel,
};
use fabstir_text_scan::vision::ocr::{RecognitionOutcome, NO_TEXT_FOUND, RECOGNITION_FAILED};
use fabstir_text_scan::vision::{DetectionPipeline, VisionError};
use image::{DynamicImage, Rgba, RgbaImage};
use ndarray::Array4;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const GRID: usize = 80;
const IMAGE_SIZE: u32 = 320;

fn pipeline_with(ocr: Arc<FakeOcr>) -> DetectionPipeline {
    DetectionPipeline::new(ScanConfig::default(), ocr)
}

fn single_cell() -> PrecomputedDetection {
    PrecomputedDetection::new(grids(GRID, GRID, &[(2, 3, 0.9, [4.0, 6.0, 4.0, 6.0, 0.0])]))
}

#[tokio::test]
async fn test_single_cell_scan() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr.clone());
    let image = white_image(IMAGE_SIZE);

    let result = pipeline.run(Some(&single_cell()), Some(&image)).await.unwrap();

    assert_eq!(result.boxes, vec![TextBox::new(2.0, 8.0, 12.0, 8.0)]);
    let texts: Vec<&str> = result.recognition.texts().collect();
    assert_eq!(texts, vec!["320x320", "12x8"]);

    let crop = &result.recognition.crops()[0];
    assert_eq!(crop.image.dimensions(), (12, 8));
    assert!(!crop.clamped);
    assert_eq!(crop.outcome, RecognitionOutcome::Recognized);
}

#[tokio::test]
async fn test_all_zero_confidence() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr.clone());
    let model = PrecomputedDetection::new(grids(GRID, GRID, &[]));
    let image = white_image(IMAGE_SIZE);

    let with_image = pipeline.run(Some(&model), Some(&image)).await.unwrap();
    assert!(with_image.boxes.is_empty());
    assert_eq!(with_image.recognition.len(), 1);
    assert!(with_image.recognition.full_image().is_some());

    let without_image = pipeline.run(Some(&model), None).await.unwrap();
    assert!(without_image.boxes.is_empty());
    assert!(without_image.recognition.is_empty());
}

#[tokio::test]
async fn test_runs_are_idempotent() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr.clone());
    let model = PrecomputedDetection::new(grids(
        GRID,
        GRID,
        &[
            (2, 3, 0.9, [4.0, 6.0, 4.0, 6.0, 0.0]),
            (40, 40, 0.7, [5.0, 20.0, 5.0, 20.0, 0.1]),
            (70, 10, 0.6, [2.0, 8.0, 2.0, 8.0, 0.0]),
        ],
    ));
    let image = white_image(IMAGE_SIZE);

    let first = pipeline.run(Some(&model), Some(&image)).await.unwrap();
    let second = pipeline.run(Some(&model), Some(&image)).await.unwrap();

    assert_eq!(first.boxes, second.boxes);
    let first_texts: Vec<&str> = first.recognition.texts().collect();
    let second_texts: Vec<&str> = second.recognition.texts().collect();
    assert_eq!(first_texts, second_texts);
    assert_eq!(first.recognition.len(), 4);
}

#[tokio::test]
async fn test_boxes_in_descending_score_order() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr);
    let model = PrecomputedDetection::new(grids(
        GRID,
        GRID,
        &[
            (10, 10, 0.6, [2.0, 2.0, 2.0, 2.0, 0.0]),
            (50, 50, 0.95, [2.0, 2.0, 2.0, 2.0, 0.0]),
            (30, 30, 0.8, [2.0, 2.0, 2.0, 2.0, 0.0]),
        ],
    ));
    let image = white_image(IMAGE_SIZE);

    let boxes = pipeline.find_text(Some(&model), Some(&image)).await.unwrap();
    let origins: Vec<(f32, f32)> = boxes.iter().map(|b| (b.x, b.y)).collect();
    assert_eq!(origins, vec![(198.0, 198.0), (118.0, 118.0), (38.0, 38.0)]);
}

#[tokio::test]
async fn test_blank_crop_text_is_sentinel() {
    let ocr = Arc::new(FakeOcr::new(|call, _| {
        Ok(if call == 0 { "INVOICE".to_string() } else { "   ".to_string() })
    }));
    let pipeline = pipeline_with(ocr);
    let image = white_image(IMAGE_SIZE);

    let result = pipeline.run(Some(&single_cell()), Some(&image)).await.unwrap();

    let texts: Vec<&str> = result.recognition.texts().collect();
    assert_eq!(texts, vec!["INVOICE", NO_TEXT_FOUND]);
}

#[tokio::test]
async fn test_failing_box_does_not_abort_batch() {
    // Call 0 is the full image, call 2 the second box
    let ocr = Arc::new(FakeOcr::failing_at(2));
    let pipeline = pipeline_with(ocr.clone());
    let model = PrecomputedDetection::new(grids(
        GRID,
        GRID,
        &[
            (10, 10, 0.9, [4.0, 6.0, 4.0, 6.0, 0.0]),
            (40, 40, 0.8, [4.0, 6.0, 4.0, 6.0, 0.0]),
            (70, 70, 0.7, [4.0, 6.0, 4.0, 6.0, 0.0]),
        ],
    ));
    let image = white_image(IMAGE_SIZE);

    let result = pipeline.run(Some(&model), Some(&image)).await.unwrap();

    let texts: Vec<&str> = result.recognition.texts().collect();
    assert_eq!(texts, vec!["320x320", "12x8", RECOGNITION_FAILED, "12x8"]);
    assert!(matches!(
        result.recognition.crops()[1].outcome,
        RecognitionOutcome::Failed { .. }
    ));
    assert_eq!(result.recognition.images().count(), result.recognition.texts().count());
}

#[tokio::test]
async fn test_each_session_terminated_once() {
    let ocr = Arc::new(FakeOcr::failing_at(1));
    let pipeline = pipeline_with(ocr.clone());
    let model = PrecomputedDetection::new(grids(
        GRID,
        GRID,
        &[
            (10, 10, 0.9, [4.0, 6.0, 4.0, 6.0, 0.0]),
            (40, 40, 0.8, [4.0, 6.0, 4.0, 6.0, 0.0]),
        ],
    ));
    let image = white_image(IMAGE_SIZE);

    pipeline.run(Some(&model), Some(&image)).await.unwrap();

    assert_eq!(ocr.opened(), 3);
    assert_eq!(ocr.terminated(), 3);
}

#[tokio::test]
async fn test_missing_model_reads_full_image() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr.clone());
    let image = white_image(IMAGE_SIZE);

    let result = pipeline.run(None, Some(&image)).await.unwrap();

    assert!(result.boxes.is_empty());
    let texts: Vec<&str> = result.recognition.texts().collect();
    assert_eq!(texts, vec!["320x320"]);
    assert_eq!(ocr.opened(), 1);
}

#[tokio::test]
async fn test_suppression_limits() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr);

    // A dense row of heavily overlapping boxes plus many separate ones
    let mut cells = Vec::new();
    for x in 0..20 {
        cells.push((10 + x, 5, 0.6 + x as f32 * 0.01, [10.0, 10.0, 10.0, 10.0, 0.0]));
    }
    for i in 0..15 {
        cells.push((5 * i + 2, 60, 0.55, [2.0, 2.0, 2.0, 2.0, 0.0]));
    }
    let model = PrecomputedDetection::new(grids(GRID, GRID, &cells));
    let image = white_image(IMAGE_SIZE);

    let boxes = pipeline.find_text(Some(&model), Some(&image)).await.unwrap();

    assert_eq!(boxes.len(), 10);
    for (i, a) in boxes.iter().enumerate() {
        for b in &boxes[i + 1..] {
            assert!(a.iou(b) <= 0.5, "{:?} and {:?} overlap", a, b);
        }
    }
}

#[tokio::test]
async fn test_nhwc_grids_are_transposed() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr);

    let mut scores = Array4::zeros((1, GRID, GRID, 1));
    scores[[0, 3, 2, 0]] = 0.9;
    let mut geometry = Array4::zeros((1, GRID, GRID, 5));
    for (channel, value) in [4.0, 6.0, 4.0, 6.0, 0.0].iter().enumerate() {
        geometry[[0, 3, 2, channel]] = *value;
    }
    let model = PrecomputedDetection::from_grids(scores, geometry, TensorLayout::Nhwc).unwrap();
    let image = white_image(IMAGE_SIZE);

    let boxes = pipeline.find_text(Some(&model), Some(&image)).await.unwrap();
    assert_eq!(boxes, vec![TextBox::new(2.0, 8.0, 12.0, 8.0)]);
}

#[tokio::test]
async fn test_box_past_edge_is_clamped() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr);
    // Origin (316, 316), box extends past the 320px edge
    let model = PrecomputedDetection::new(grids(
        GRID,
        GRID,
        &[(79, 79, 0.9, [0.0, 10.0, 10.0, 0.0, 0.0])],
    ));
    let image = white_image(IMAGE_SIZE);

    let result = pipeline.run(Some(&model), Some(&image)).await.unwrap();

    let crop = &result.recognition.crops()[0];
    assert!(crop.clamped);
    assert_eq!(crop.source_box, Some(TextBox::new(316.0, 316.0, 10.0, 10.0)));
    assert_eq!(crop.text, "4x4");
}

#[tokio::test]
async fn test_full_image_read_at_native_resolution() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr);
    let upload = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        1600,
        1200,
        Rgba([255, 255, 255, 255]),
    ));
    let source = upload.to_rgba8();
    let image = prepare_image(&upload, IMAGE_SIZE);

    let result = pipeline
        .run_with_source(
            Some(&single_cell()),
            Some(&image),
            Some(&source),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let full = &result.recognition.entries()[0];
    assert_eq!(full.image.dimensions(), (1600, 1200));
    assert_eq!(full.text, "1600x1200");
    // Boxes and crops stay in the prepared canvas
    assert_eq!(result.boxes, vec![TextBox::new(2.0, 8.0, 12.0, 8.0)]);
    assert_eq!(result.recognition.crops()[0].text, "12x8");
}

#[tokio::test]
async fn test_detection_timeout() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let config = ScanConfig {
        detection_timeout_ms: 20,
        ..Default::default()
    };
    let pipeline = DetectionPipeline::new(config, ocr.clone());
    let model = SlowDetection {
        delay: Duration::from_secs(10),
    };
    let image = white_image(IMAGE_SIZE);

    let result = pipeline.run(Some(&model), Some(&image)).await;
    assert!(matches!(
        result,
        Err(VisionError::Timeout {
            operation: "detection",
            ..
        })
    ));
    assert_eq!(ocr.opened(), 0);
}

#[tokio::test]
async fn test_cancel_during_detection() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr.clone());
    let model = SlowDetection {
        delay: Duration::from_secs(10),
    };
    let image = white_image(IMAGE_SIZE);

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = pipeline
        .run_with_cancel(Some(&model), Some(&image), &token)
        .await;
    assert!(matches!(result, Err(VisionError::Cancelled)));
    assert_eq!(ocr.opened(), 0);
}

#[tokio::test]
async fn test_shared_model_handle() {
    let ocr = Arc::new(FakeOcr::echo_size());
    let pipeline = pipeline_with(ocr);
    let model: Arc<dyn TextDetectionModel> = Arc::new(PrecomputedDetection::new(
        DetectionOutput::empty(),
    ));
    let image = white_image(IMAGE_SIZE);

    let result = pipeline.run(Some(model.as_ref()), Some(&image)).await.unwrap();
    assert!(result.boxes.is_empty());
    assert_eq!(result.recognition.len(), 1);
}
