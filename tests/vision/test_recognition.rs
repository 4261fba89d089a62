// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Recognition driver tests against the public API

use super::common::{white_image, FakeOcr};
use fabstir_text_scan::config::RecognitionConfig;
use fabstir_text_scan::vision::detection::TextBox;
use fabstir_text_scan::vision::ocr::{
    crop_region, RecognitionDriver, RecognitionOutcome, NO_TEXT_FOUND,
};
use image::{Rgba, RgbaImage};

#[tokio::test]
async fn test_entry_zero_is_full_image() {
    let ocr = FakeOcr::echo_size();
    let config = RecognitionConfig::default();
    let driver = RecognitionDriver::new(&ocr, &config);
    let image = white_image(64);

    let boxes = [
        TextBox::new(0.0, 0.0, 10.0, 5.0),
        TextBox::new(20.0, 20.0, 7.5, 3.2),
    ];
    let result = driver.recognize(Some(&image), &boxes).await;

    assert_eq!(result.len(), 3);
    let full = result.full_image().unwrap();
    assert!(full.source_box.is_none());
    assert_eq!(full.image.dimensions(), (64, 64));

    let sizes: Vec<(u32, u32)> = result.crops().iter().map(|e| e.image.dimensions()).collect();
    assert_eq!(sizes, vec![(10, 5), (8, 4)]);
    assert_eq!(result.crops()[1].source_box, Some(boxes[1]));
}

#[tokio::test]
async fn test_empty_full_image_text_is_kept() {
    let ocr = FakeOcr::new(|_, _| Ok(String::new()));
    let config = RecognitionConfig::default();
    let driver = RecognitionDriver::new(&ocr, &config);
    let image = white_image(32);

    let result = driver
        .recognize(Some(&image), &[TextBox::new(1.0, 1.0, 4.0, 4.0)])
        .await;

    let texts: Vec<&str> = result.texts().collect();
    assert_eq!(texts, vec!["", NO_TEXT_FOUND]);
}

#[tokio::test]
async fn test_crop_matches_source_pixels() {
    let ocr = FakeOcr::echo_size();
    let config = RecognitionConfig::default();
    let driver = RecognitionDriver::new(&ocr, &config);
    let image = RgbaImage::from_fn(40, 40, |x, y| Rgba([x as u8, y as u8, 7, 255]));

    let bbox = TextBox::new(10.0, 12.0, 6.0, 4.0);
    let result = driver.recognize(Some(&image), &[bbox]).await;

    assert_eq!(result.crops()[0].image, crop_region(&image, &bbox).unwrap());
    assert_eq!(result.crops()[0].image.get_pixel(0, 0), &Rgba([10, 12, 7, 255]));
}

#[tokio::test]
async fn test_failed_full_image_still_reads_boxes() {
    let ocr = FakeOcr::failing_at(0);
    let config = RecognitionConfig::default();
    let driver = RecognitionDriver::new(&ocr, &config);
    let image = white_image(32);

    let result = driver
        .recognize(Some(&image), &[TextBox::new(0.0, 0.0, 8.0, 8.0)])
        .await;

    assert!(matches!(
        result.full_image().unwrap().outcome,
        RecognitionOutcome::Failed { .. }
    ));
    assert_eq!(result.crops()[0].text, "8x8");
    assert_eq!(ocr.terminated(), 2);
}

#[tokio::test]
async fn test_into_entries_preserves_order() {
    let ocr = FakeOcr::new(|call, _| Ok(format!("call {}", call)));
    let config = RecognitionConfig::default();
    let driver = RecognitionDriver::new(&ocr, &config);
    let image = white_image(32);

    let boxes = [
        TextBox::new(0.0, 0.0, 4.0, 4.0),
        TextBox::new(8.0, 8.0, 4.0, 4.0),
        TextBox::new(16.0, 16.0, 4.0, 4.0),
    ];
    let entries = driver.recognize(Some(&image), &boxes).await.into_entries();

    let texts: Vec<String> = entries.into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec!["call 0", "call 1", "call 2", "call 3"]);
}
