// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision model manager for loading the text detector and the OCR engine

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ScanConfig;
use crate::vision::detection::EastDetectionModel;
use crate::vision::ocr::TesseractEngine;

/// Configuration for loading vision models
#[derive(Debug, Clone)]
pub struct VisionModelConfig {
    /// Path to the EAST ONNX model (optional)
    pub detection_model_path: Option<String>,
    /// Whether to initialize Tesseract
    pub enable_ocr: bool,
    /// Directory holding `<language>.traineddata`, `None` for the library default
    pub tessdata_dir: Option<String>,
}

impl Default for VisionModelConfig {
    fn default() -> Self {
        Self {
            detection_model_path: Some("./models/east-text-detector.onnx".to_string()),
            enable_ocr: true,
            tessdata_dir: None,
        }
    }
}

/// Information about a loaded vision model
#[derive(Debug, Clone)]
pub struct VisionModelInfo {
    /// Model name
    pub name: String,
    /// Model type (detection, ocr)
    pub model_type: String,
    /// Whether the model is available
    pub available: bool,
}

/// Manager for the text detector and OCR engine
///
/// A model that fails to load is logged and reported as unavailable, so the
/// scanner can still fall back to full-image OCR.
pub struct VisionModelManager {
    detection_model: Option<Arc<EastDetectionModel>>,
    ocr_engine: Option<Arc<TesseractEngine>>,
}

impl VisionModelManager {
    /// Create a new VisionModelManager with the given configuration
    ///
    /// Missing model files and language data are handled gracefully.
    pub async fn new(config: VisionModelConfig, scan: &ScanConfig) -> anyhow::Result<Self> {
        let detection_model = if let Some(ref path) = config.detection_model_path {
            match EastDetectionModel::new(path, scan.preprocess.clone()).await {
                Ok(model) => {
                    tracing::info!("✅ EAST detection model loaded from {}", path);
                    Some(Arc::new(model))
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to load detection model from {}: {:#}", path, e);
                    None
                }
            }
        } else {
            None
        };

        let ocr_engine = if config.enable_ocr {
            let language = &scan.recognition.language;
            match TesseractEngine::load(config.tessdata_dir.as_ref().map(PathBuf::from), language)
                .await
            {
                Ok(engine) => {
                    tracing::info!("✅ Tesseract OCR engine ready ({})", language);
                    Some(Arc::new(engine))
                }
                Err(e) => {
                    tracing::warn!("⚠️ Tesseract unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            detection_model,
            ocr_engine,
        })
    }

    /// Get the detection model if available
    pub fn get_detection_model(&self) -> Option<Arc<EastDetectionModel>> {
        self.detection_model.clone()
    }

    /// Get the OCR engine if available
    pub fn get_ocr_engine(&self) -> Option<Arc<TesseractEngine>> {
        self.ocr_engine.clone()
    }

    pub fn has_detection(&self) -> bool {
        self.detection_model.is_some()
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr_engine.is_some()
    }

    /// List all vision models and whether they loaded
    pub fn list_models(&self) -> Vec<VisionModelInfo> {
        vec![
            VisionModelInfo {
                name: "east".to_string(),
                model_type: "detection".to_string(),
                available: self.detection_model.is_some(),
            },
            VisionModelInfo {
                name: "tesseract".to_string(),
                model_type: "ocr".to_string(),
                available: self.ocr_engine.is_some(),
            },
        ]
    }
}
