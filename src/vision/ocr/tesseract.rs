// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tesseract OCR engine
//!
//! Backed by libtesseract through `leptess`. A Tesseract handle is not
//! `Send`, so every recognition builds one on a blocking thread, feeds it
//! the PNG bytes from memory and drops it before returning.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use leptess::LepTess;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::engine::{OcrEngine, OcrInput, OcrSession};
use crate::vision::error::{VisionError, VisionResult};
use crate::vision::image_utils::encode_png;

/// Where Tesseract looks up `<language>.traineddata`
#[derive(Debug, Clone, PartialEq, Eq)]
struct TessSettings {
    /// `None` uses the library default (`TESSDATA_PREFIX` or the install prefix)
    data_dir: Option<PathBuf>,
    language: String,
}

impl TessSettings {
    fn data_path(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned())
    }

    /// Must be called on a blocking thread
    fn init(&self) -> std::result::Result<LepTess, String> {
        let data_path = self.data_path();
        LepTess::new(data_path.as_deref(), &self.language).map_err(|e| {
            format!(
                "Failed to initialize Tesseract with language '{}': {}",
                self.language, e
            )
        })
    }
}

/// OCR engine backed by libtesseract
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    settings: TessSettings,
}

impl TesseractEngine {
    /// Create an engine without checking that the language data loads
    pub fn from_parts(data_dir: Option<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            settings: TessSettings {
                data_dir,
                language: language.into(),
            },
        }
    }

    /// Create an engine after confirming Tesseract initializes with `language`
    pub async fn load(data_dir: Option<PathBuf>, language: impl Into<String>) -> Result<Self> {
        let engine = Self::from_parts(data_dir, language);

        let settings = engine.settings.clone();
        tokio::task::spawn_blocking(move || settings.init().map(drop))
            .await
            .map_err(|e| anyhow!("Tesseract initialization task failed: {}", e))?
            .map_err(|e| {
                anyhow!(
                    "{}. Make sure the language data is installed (e.g. tesseract-ocr-{})",
                    e,
                    engine.settings.language
                )
            })?;

        info!(
            "Using Tesseract (language: {}, data: {})",
            engine.settings.language,
            engine
                .data_dir()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "default".to_string())
        );

        Ok(engine)
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.settings.data_dir.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.settings.language
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn open_session(&self) -> VisionResult<Box<dyn OcrSession>> {
        debug!("Opened tesseract session ({})", self.settings.language);
        Ok(Box::new(TesseractSession {
            settings: Some(self.settings.clone()),
        }))
    }
}

struct TesseractSession {
    /// Taken on terminate
    settings: Option<TessSettings>,
}

fn read_text(settings: &TessSettings, png: &[u8]) -> VisionResult<String> {
    let mut lt = settings.init().map_err(VisionError::Ocr)?;

    lt.set_image_from_mem(png)
        .map_err(|e| VisionError::Ocr(format!("Failed to set image from memory: {}", e)))?;

    lt.get_utf8_text()
        .map_err(|e| VisionError::Ocr(format!("Tesseract returned invalid UTF-8: {}", e)))
}

#[async_trait]
impl OcrSession for TesseractSession {
    async fn recognize(&mut self, input: OcrInput<'_>) -> VisionResult<String> {
        let settings = self
            .settings
            .clone()
            .ok_or_else(|| VisionError::Ocr("session already terminated".to_string()))?;

        let png = match input {
            OcrInput::Pixels(image) => encode_png(image)?,
            OcrInput::Encoded(bytes) => bytes.to_vec(),
        };

        tokio::task::spawn_blocking(move || read_text(&settings, &png))
            .await
            .map_err(|e| VisionError::Ocr(format!("Tesseract task failed: {}", e)))?
    }

    async fn terminate(&mut self) -> VisionResult<()> {
        if self.settings.take().is_some() {
            debug!("Closed tesseract session");
        }
        Ok(())
    }
}
