// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Recognition driver
//!
//! Runs one OCR call over the full image and one per retained box, strictly
//! in order, and collects `(image, text)` entries. A failing call degrades its
//! own entry and never aborts the rest of the batch.

use image::RgbaImage;
use serde::Serialize;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::crop::crop_region;
use super::engine::{OcrEngine, OcrInput};
use crate::config::RecognitionConfig;
use crate::vision::detection::TextBox;
use crate::vision::error::{VisionError, VisionResult};
use crate::vision::image_utils::encode_png;

/// Text reported for a crop whose recognized text is blank
pub const NO_TEXT_FOUND: &str = "No text found";

/// Text reported for an entry whose OCR call failed or timed out
pub const RECOGNITION_FAILED: &str = "Text recognition failed";

/// How an entry's text came about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecognitionOutcome {
    /// The engine returned non-blank text
    Recognized,
    /// The engine found nothing, or the box lay outside the image
    NoText,
    /// The engine call failed; the text is [`RECOGNITION_FAILED`]
    Failed { reason: String },
}

/// One recognized image and its text
#[derive(Debug, Clone)]
pub struct RecognizedImage {
    pub image: RgbaImage,
    pub text: String,
    pub outcome: RecognitionOutcome,
    /// Box the crop was cut from, `None` for the full image
    pub source_box: Option<TextBox>,
    /// Whether the box was clamped to the image before cropping
    pub clamped: bool,
}

impl RecognizedImage {
    fn full_image(image: RgbaImage, text: String, outcome: RecognitionOutcome) -> Self {
        Self {
            image,
            text,
            outcome,
            source_box: None,
            clamped: false,
        }
    }
}

/// Ordered recognition entries
///
/// When a full image was supplied, entry 0 is its recognition and the rest
/// follow the box order one to one.
#[derive(Debug, Clone, Default)]
pub struct RecognitionResult {
    entries: Vec<RecognizedImage>,
    includes_full_image: bool,
}

impl RecognitionResult {
    pub fn entries(&self) -> &[RecognizedImage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = &RgbaImage> + '_ {
        self.entries.iter().map(|e| &e.image)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.text.as_str())
    }

    /// Recognition of the full source image, if one was supplied
    pub fn full_image(&self) -> Option<&RecognizedImage> {
        if self.includes_full_image {
            self.entries.first()
        } else {
            None
        }
    }

    /// Entries for the cropped boxes, in box order
    pub fn crops(&self) -> &[RecognizedImage] {
        let skip = usize::from(self.includes_full_image).min(self.entries.len());
        &self.entries[skip..]
    }

    pub fn into_entries(self) -> Vec<RecognizedImage> {
        self.entries
    }
}

/// Drives the OCR engine over the full image and each box
pub struct RecognitionDriver<'a> {
    engine: &'a dyn OcrEngine,
    config: &'a RecognitionConfig,
}

impl<'a> RecognitionDriver<'a> {
    pub fn new(engine: &'a dyn OcrEngine, config: &'a RecognitionConfig) -> Self {
        Self { engine, config }
    }

    /// Recognize the full image and every box
    ///
    /// Without a full image there is nothing to crop from, so the result is
    /// empty.
    pub async fn recognize(
        &self,
        full_image: Option<&RgbaImage>,
        boxes: &[TextBox],
    ) -> RecognitionResult {
        // A fresh token never fires, so the only error path is unreachable
        let token = CancellationToken::new();
        self.recognize_with_cancel(full_image, boxes, &token)
            .await
            .unwrap_or_default()
    }

    /// Same as [`recognize`](Self::recognize), stopping early when `cancel` fires
    ///
    /// The token is checked before each OCR call and races the call itself.
    pub async fn recognize_with_cancel(
        &self,
        full_image: Option<&RgbaImage>,
        boxes: &[TextBox],
        cancel: &CancellationToken,
    ) -> VisionResult<RecognitionResult> {
        self.recognize_with_source(full_image, None, boxes, cancel)
            .await
    }

    /// Recognize with a separate image for the whole-page pass
    ///
    /// `full_image` is the image the boxes refer to and the one crops are cut
    /// from. `source`, when given, is read instead of it for entry 0, which
    /// lets callers OCR the page at its native resolution while detection
    /// works on a resized copy.
    pub async fn recognize_with_source(
        &self,
        full_image: Option<&RgbaImage>,
        source: Option<&RgbaImage>,
        boxes: &[TextBox],
        cancel: &CancellationToken,
    ) -> VisionResult<RecognitionResult> {
        let mut result = RecognitionResult::default();

        let Some(full) = full_image else {
            if !boxes.is_empty() {
                warn!(
                    "⚠️ {} boxes supplied without an image, nothing to recognize",
                    boxes.len()
                );
            }
            return Ok(result);
        };
        let page = source.unwrap_or(full);

        ensure_not_cancelled(cancel)?;
        let entry = match self.ocr_once(OcrInput::Pixels(page), cancel).await {
            Ok(text) => {
                let outcome = if text.trim().is_empty() {
                    RecognitionOutcome::NoText
                } else {
                    RecognitionOutcome::Recognized
                };
                RecognizedImage::full_image(page.clone(), text, outcome)
            }
            Err(VisionError::Cancelled) => return Err(VisionError::Cancelled),
            Err(e) => {
                warn!("⚠️ Full image recognition failed: {}", e);
                RecognizedImage::full_image(
                    page.clone(),
                    RECOGNITION_FAILED.to_string(),
                    RecognitionOutcome::Failed {
                        reason: e.to_string(),
                    },
                )
            }
        };
        result.entries.push(entry);
        result.includes_full_image = true;

        for (index, bbox) in boxes.iter().enumerate() {
            ensure_not_cancelled(cancel)?;
            let entry = self.recognize_box(full, index, bbox, cancel).await?;
            result.entries.push(entry);
        }

        debug!(
            "Recognized {} entries ({} boxes) with {}",
            result.len(),
            boxes.len(),
            self.engine.name()
        );
        Ok(result)
    }

    async fn recognize_box(
        &self,
        full: &RgbaImage,
        index: usize,
        bbox: &TextBox,
        cancel: &CancellationToken,
    ) -> VisionResult<RecognizedImage> {
        let (target, clamped) = if self.config.clamp_boxes {
            match bbox.clamp_to(full.width(), full.height()) {
                Some(inside) => (inside, inside != *bbox),
                None => {
                    debug!("Box {} lies outside the image, skipping OCR", index);
                    return Ok(RecognizedImage {
                        image: RgbaImage::new(0, 0),
                        text: NO_TEXT_FOUND.to_string(),
                        outcome: RecognitionOutcome::NoText,
                        source_box: Some(*bbox),
                        clamped: true,
                    });
                }
            }
        } else {
            (*bbox, false)
        };

        let crop = match crop_region(full, &target) {
            Ok(crop) => crop,
            Err(e) => {
                warn!("⚠️ Cannot crop box {}: {}", index, e);
                return Ok(RecognizedImage {
                    image: RgbaImage::new(0, 0),
                    text: RECOGNITION_FAILED.to_string(),
                    outcome: RecognitionOutcome::Failed {
                        reason: e.to_string(),
                    },
                    source_box: Some(*bbox),
                    clamped,
                });
            }
        };
        debug!(
            "Box {}: cropped {}x{} at ({:.1}, {:.1})",
            index,
            crop.width(),
            crop.height(),
            target.x,
            target.y
        );

        let recognized = match encode_png(&crop) {
            Ok(png) => self.ocr_once(OcrInput::Encoded(&png), cancel).await,
            Err(e) => Err(e),
        };

        let (text, outcome) = match recognized {
            Ok(text) if text.trim().is_empty() => {
                (NO_TEXT_FOUND.to_string(), RecognitionOutcome::NoText)
            }
            Ok(text) => (text, RecognitionOutcome::Recognized),
            Err(VisionError::Cancelled) => return Err(VisionError::Cancelled),
            Err(e) => {
                warn!("⚠️ Recognition failed for box {}: {}", index, e);
                (
                    RECOGNITION_FAILED.to_string(),
                    RecognitionOutcome::Failed {
                        reason: e.to_string(),
                    },
                )
            }
        };

        Ok(RecognizedImage {
            image: crop,
            text,
            outcome,
            source_box: Some(*bbox),
            clamped,
        })
    }

    /// Open a session, recognize once, and always terminate the session
    async fn ocr_once(
        &self,
        input: OcrInput<'_>,
        cancel: &CancellationToken,
    ) -> VisionResult<String> {
        let mut session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VisionError::Cancelled),
            session = self.engine.open_session() => session?,
        };

        let recognized = {
            let call = with_timeout(session.recognize(input), self.config.ocr_timeout());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(VisionError::Cancelled),
                result = call => result,
            }
        };

        if let Err(e) = session.terminate().await {
            warn!("⚠️ Failed to terminate {} session: {}", self.engine.name(), e);
        }

        recognized
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> VisionResult<()> {
    if cancel.is_cancelled() {
        Err(VisionError::Cancelled)
    } else {
        Ok(())
    }
}

async fn with_timeout<F>(call: F, limit: Option<std::time::Duration>) -> VisionResult<String>
where
    F: Future<Output = VisionResult<String>>,
{
    match limit {
        Some(timeout) => tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(VisionError::Timeout {
                operation: "ocr",
                timeout,
            })),
        None => call.await,
    }
}
