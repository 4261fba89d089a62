// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text recognition over the full image and detected regions
//!
//! Components:
//! - `engine` - OCR engine and session service traits
//! - `tesseract` - Tesseract command-line engine
//! - `crop` - Cutting boxes out of the source image
//! - `recognition` - Sequential driver producing ordered `(image, text)` entries

pub mod crop;
pub mod engine;
pub mod recognition;
pub mod tesseract;

pub use crop::{crop_region, PixelRegion};
pub use engine::{OcrEngine, OcrInput, OcrSession};
pub use recognition::{
    RecognitionDriver, RecognitionOutcome, RecognitionResult, RecognizedImage, NO_TEXT_FOUND,
    RECOGNITION_FAILED,
};
pub use tesseract::TesseractEngine;
