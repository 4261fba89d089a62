// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tunables for the text scanning pipeline
//!
//! Every constant the scanner relies on (confidence threshold, grid stride,
//! suppression limits, OCR locale, timeouts) lives here so it can be set from
//! a TOML file instead of being baked into the decoder or suppressor.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::vision::detection::TensorLayout;

/// Detector input edge length in pixels
pub const DEFAULT_INPUT_SIZE: u32 = 320;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// How grid cells are turned into candidate boxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Cells must score strictly above this to produce a box
    pub threshold: f32,
    /// Input pixels per grid cell along each axis
    pub grid_stride: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            grid_stride: 4,
        }
    }
}

/// Non-maximum suppression limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionConfig {
    /// Maximum number of boxes kept
    pub max_boxes: usize,
    /// Boxes overlapping a kept box by more than this IoU are dropped
    pub iou_threshold: f32,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            max_boxes: 10,
            iou_threshold: 0.5,
        }
    }
}

/// OCR pass settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Tesseract language code
    pub language: String,
    /// Clip boxes to the image before cropping and flag the ones that moved
    pub clamp_boxes: bool,
    /// Per-call OCR deadline in milliseconds (0 disables it)
    pub ocr_timeout_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            clamp_boxes: true,
            ocr_timeout_ms: 30_000,
        }
    }
}

impl RecognitionConfig {
    pub fn ocr_timeout(&self) -> Option<Duration> {
        (self.ocr_timeout_ms > 0).then(|| Duration::from_millis(self.ocr_timeout_ms))
    }
}

/// Detector input preparation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Images are resized to `input_size x input_size` before detection
    pub input_size: u32,
    /// Layout of the detector's input and output tensors
    pub layout: TensorLayout,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            layout: TensorLayout::Nhwc,
        }
    }
}

/// Full scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub decoder: DecoderConfig,
    pub suppression: SuppressionConfig,
    pub recognition: RecognitionConfig,
    pub preprocess: PreprocessConfig,
    /// Detection deadline in milliseconds (0 disables it)
    pub detection_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            suppression: SuppressionConfig::default(),
            recognition: RecognitionConfig::default(),
            preprocess: PreprocessConfig::default(),
            detection_timeout_ms: 30_000,
        }
    }
}

impl ScanConfig {
    /// Parse and validate a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn detection_timeout(&self) -> Option<Duration> {
        (self.detection_timeout_ms > 0).then(|| Duration::from_millis(self.detection_timeout_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.decoder.threshold) {
            return Err(ConfigError::Invalid(format!(
                "decoder.threshold must be within [0, 1], got {}",
                self.decoder.threshold
            )));
        }
        if self.decoder.grid_stride == 0 {
            return Err(ConfigError::Invalid(
                "decoder.grid_stride must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.suppression.iou_threshold) {
            return Err(ConfigError::Invalid(format!(
                "suppression.iou_threshold must be within [0, 1], got {}",
                self.suppression.iou_threshold
            )));
        }
        if self.preprocess.input_size == 0 || self.preprocess.input_size % 32 != 0 {
            return Err(ConfigError::Invalid(format!(
                "preprocess.input_size must be a positive multiple of 32, got {}",
                self.preprocess.input_size
            )));
        }
        if self.recognition.language.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "recognition.language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
