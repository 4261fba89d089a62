// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Find-and-read-text pipeline
//!
//! Detection model -> geometry decode -> suppression -> crop -> OCR. The
//! pipeline holds no state between calls; every run is independent.

use image::RgbaImage;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::vision::detection::{BoxSuppressor, GeometryDecoder, TextBox, TextDetectionModel};
use crate::vision::error::{VisionError, VisionResult};
use crate::vision::ocr::{OcrEngine, RecognitionDriver, RecognitionResult};

/// Boxes found in an image and the text read from it
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Retained boxes, highest confidence first
    pub boxes: Vec<TextBox>,
    pub recognition: RecognitionResult,
}

/// End-to-end text scanner
pub struct DetectionPipeline {
    config: ScanConfig,
    ocr: Arc<dyn OcrEngine>,
}

impl DetectionPipeline {
    pub fn new(config: ScanConfig, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { config, ocr }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Detect, decode and suppress
    ///
    /// Returns no boxes when either the model or the image is missing.
    pub async fn find_text(
        &self,
        model: Option<&dyn TextDetectionModel>,
        image: Option<&RgbaImage>,
    ) -> VisionResult<Vec<TextBox>> {
        self.detect(model, image, &CancellationToken::new()).await
    }

    /// OCR the full image and every box, in order
    pub async fn read_texts(
        &self,
        boxes: &[TextBox],
        image: Option<&RgbaImage>,
    ) -> RecognitionResult {
        RecognitionDriver::new(self.ocr.as_ref(), &self.config.recognition)
            .recognize(image, boxes)
            .await
    }

    /// Find text regions and read them
    ///
    /// A missing model or image is not an error: detection is skipped and the
    /// full image, if any, is still recognized.
    pub async fn run(
        &self,
        model: Option<&dyn TextDetectionModel>,
        image: Option<&RgbaImage>,
    ) -> VisionResult<ScanResult> {
        self.run_with_cancel(model, image, &CancellationToken::new())
            .await
    }

    /// Same as [`run`](Self::run), stopping with [`VisionError::Cancelled`]
    /// when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        model: Option<&dyn TextDetectionModel>,
        image: Option<&RgbaImage>,
        cancel: &CancellationToken,
    ) -> VisionResult<ScanResult> {
        self.run_with_source(model, image, None, cancel).await
    }

    /// Scan a prepared image, reading `source` for the whole-page pass
    ///
    /// Detection, cropping and clamping work on `image`. When `source` is
    /// given (typically the upload at its native resolution), entry 0 of the
    /// recognition is read from it instead.
    pub async fn run_with_source(
        &self,
        model: Option<&dyn TextDetectionModel>,
        image: Option<&RgbaImage>,
        source: Option<&RgbaImage>,
        cancel: &CancellationToken,
    ) -> VisionResult<ScanResult> {
        let boxes = self.detect(model, image, cancel).await?;

        let recognition = RecognitionDriver::new(self.ocr.as_ref(), &self.config.recognition)
            .recognize_with_source(image, source, &boxes, cancel)
            .await?;

        info!(
            "Scan finished: {} boxes, {} recognized entries",
            boxes.len(),
            recognition.len()
        );

        Ok(ScanResult { boxes, recognition })
    }

    async fn detect(
        &self,
        model: Option<&dyn TextDetectionModel>,
        image: Option<&RgbaImage>,
        cancel: &CancellationToken,
    ) -> VisionResult<Vec<TextBox>> {
        if cancel.is_cancelled() {
            return Err(VisionError::Cancelled);
        }

        let (Some(model), Some(image)) = (model, image) else {
            debug!("No detection model or image, skipping detection");
            return Ok(Vec::new());
        };

        let prediction = async {
            match self.config.detection_timeout() {
                Some(timeout) => tokio::time::timeout(timeout, model.predict(image))
                    .await
                    .unwrap_or(Err(VisionError::Timeout {
                        operation: "detection",
                        timeout,
                    })),
                None => model.predict(image).await,
            }
        };

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VisionError::Cancelled),
            output = prediction => output?,
        };

        let candidates = GeometryDecoder::new(self.config.decoder.clone()).decode(&output);
        if candidates.is_empty() {
            debug!("No cells above threshold");
            return Ok(Vec::new());
        }

        let boxes = BoxSuppressor::new(self.config.suppression.clone()).suppress(candidates);
        debug!("Retained {} boxes after suppression", boxes.len());
        Ok(boxes)
    }
}
