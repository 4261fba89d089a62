// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error type shared by the detection and recognition halves of the scanner

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the text scanning pipeline
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Invalid {name} tensor shape {shape:?}: {reason}")]
    InvalidTensorShape {
        name: &'static str,
        shape: Vec<usize>,
        reason: String,
    },

    #[error("Text detection failed: {0}")]
    Inference(String),

    #[error("OCR engine failed: {0}")]
    Ocr(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Crop region {width}x{height} exceeds the {max_width}x{max_height} limit")]
    RegionTooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("Text scan cancelled")]
    Cancelled,

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    pub(crate) fn invalid_shape(name: &'static str, shape: &[usize], reason: impl Into<String>) -> Self {
        Self::InvalidTensorShape {
            name,
            shape: shape.to_vec(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the vision module
pub type VisionResult<T> = Result<T, VisionError>;
