// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod vision;

// Re-export main types
pub use config::{ConfigError, ScanConfig};
pub use vision::{
    DetectionPipeline, OcrEngine, RecognitionResult, ScanResult, TextBox, TextDetectionModel,
    VisionError, VisionResult,
};
