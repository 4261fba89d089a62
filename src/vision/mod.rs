// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based text scanning
//!
//! This module provides:
//! - Text region detection with the EAST network
//! - OCR over the full image and each detected region via Tesseract
//!
//! Detection runs on CPU only.

pub mod detection;
pub mod error;
pub mod image_utils;
pub mod model_manager;
pub mod ocr;
pub mod pipeline;

pub use detection::{
    BoxSuppressor, DetectionOutput, EastDetectionModel, GeometryDecoder, ScoredBox, TextBox,
    TextDetectionModel,
};
pub use error::{VisionError, VisionResult};
pub use image_utils::{decode_image_bytes, detect_format, encode_png, ImageError, ImageInfo};
pub use model_manager::{VisionModelConfig, VisionModelInfo, VisionModelManager};
pub use ocr::{
    OcrEngine, RecognitionDriver, RecognitionOutcome, RecognitionResult, RecognizedImage,
    TesseractEngine,
};
pub use pipeline::{DetectionPipeline, ScanResult};
