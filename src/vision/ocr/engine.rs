// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR engine service contract
//!
//! An engine hands out sessions; a session recognizes text in one image at a
//! time and must be terminated when the caller is done with it. Sessions are
//! never shared between concurrent calls.

use async_trait::async_trait;
use image::RgbaImage;

use crate::vision::error::VisionResult;

/// Image data accepted by an OCR session
#[derive(Debug, Clone, Copy)]
pub enum OcrInput<'a> {
    /// Decoded RGBA pixels
    Pixels(&'a RgbaImage),
    /// An encoded image file (PNG)
    Encoded(&'a [u8]),
}

/// Factory for OCR sessions
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs and reports
    fn name(&self) -> &str;

    /// Start a session; the caller terminates it after a single recognize call
    async fn open_session(&self) -> VisionResult<Box<dyn OcrSession>>;
}

/// A single-use recognition session
#[async_trait]
pub trait OcrSession: Send {
    /// Best-effort text in the image, empty when nothing was found
    async fn recognize(&mut self, input: OcrInput<'_>) -> VisionResult<String>;

    /// Release the session's resources
    async fn terminate(&mut self) -> VisionResult<()>;
}
