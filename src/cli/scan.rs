// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::vision::detection::{prepare_image, TextBox, TextDetectionModel};
use crate::vision::image_utils::load_image_file;
use crate::vision::ocr::RecognitionOutcome;
use crate::vision::{DetectionPipeline, ScanResult, VisionModelConfig, VisionModelManager};

const DEFAULT_MODEL_PATH: &str = "./models/east-text-detector.onnx";

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Image to scan
    #[arg(long)]
    pub image: PathBuf,

    /// EAST detection model (ONNX)
    #[arg(long, env = "TEXT_SCAN_MODEL", default_value = DEFAULT_MODEL_PATH)]
    pub model: String,

    /// Scan configuration file (TOML)
    #[arg(long, env = "TEXT_SCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tesseract language data directory (defaults to TESSDATA_PREFIX)
    #[arg(long, env = "TEXT_SCAN_TESSDATA")]
    pub tessdata: Option<PathBuf>,

    /// Skip detection and only OCR the full image
    #[arg(long)]
    pub no_detect: bool,

    /// Print single-line JSON
    #[arg(long)]
    pub compact: bool,
}

/// Arguments for the models command
#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// EAST detection model (ONNX)
    #[arg(long, env = "TEXT_SCAN_MODEL", default_value = DEFAULT_MODEL_PATH)]
    pub model: String,

    /// Tesseract language data directory (defaults to TESSDATA_PREFIX)
    #[arg(long, env = "TEXT_SCAN_TESSDATA")]
    pub tessdata: Option<PathBuf>,
}

/// JSON report printed by the scan command
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub image: String,
    /// Working resolution the boxes and crops refer to
    pub width: u32,
    pub height: u32,
    pub detection: bool,
    pub boxes: Vec<TextBox>,
    pub entries: Vec<EntryReport>,
}

/// One recognition entry in the report
#[derive(Debug, Serialize)]
pub struct EntryReport {
    pub index: usize,
    pub kind: EntryKind,
    pub text: String,
    pub outcome: RecognitionOutcome,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_box: Option<TextBox>,
    pub clamped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    FullImage,
    Region,
}

impl ScanReport {
    pub fn new(image: &Path, width: u32, height: u32, detection: bool, result: &ScanResult) -> Self {
        let entries = result
            .recognition
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| EntryReport {
                index,
                kind: if entry.source_box.is_some() {
                    EntryKind::Region
                } else {
                    EntryKind::FullImage
                },
                text: entry.text.clone(),
                outcome: entry.outcome.clone(),
                width: entry.image.width(),
                height: entry.image.height(),
                source_box: entry.source_box,
                clamped: entry.clamped,
            })
            .collect();

        Self {
            image: image.display().to_string(),
            width,
            height,
            detection,
            boxes: result.boxes.clone(),
            entries,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let config = match path {
        Some(path) => {
            info!("📄 Loading scan config from {}", path.display());
            ScanConfig::from_toml_file(path)?
        }
        None => ScanConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Scan an image and print the report
pub async fn scan_image(args: ScanArgs) -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let config = load_config(args.config.as_deref())?;

    let (source, image_info) = load_image_file(&args.image)
        .with_context(|| format!("Failed to load image {}", args.image.display()))?;
    info!(
        "🖼️ Loaded {}x{} {:?} image ({} bytes)",
        image_info.width, image_info.height, image_info.format, image_info.size_bytes
    );

    let image = prepare_image(&source, config.preprocess.input_size);

    let manager = VisionModelManager::new(
        VisionModelConfig {
            detection_model_path: (!args.no_detect).then(|| args.model.clone()),
            enable_ocr: true,
            tessdata_dir: args.tessdata.as_ref().map(|dir| dir.display().to_string()),
        },
        &config,
    )
    .await?;

    let ocr = manager
        .get_ocr_engine()
        .ok_or_else(|| anyhow!("Tesseract is required. Use --tessdata or set TEXT_SCAN_TESSDATA"))?;

    let detection_model = manager.get_detection_model();
    if detection_model.is_none() && !args.no_detect {
        warn!("⚠️ No detection model, reading the full image only");
    }

    let pipeline = DetectionPipeline::new(config, ocr);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling scan");
            on_interrupt.cancel();
        }
    });

    let model_ref = detection_model
        .as_deref()
        .map(|model| model as &dyn TextDetectionModel);
    let native = source.to_rgba8();
    let result = pipeline
        .run_with_source(model_ref, Some(&image), Some(&native), &cancel)
        .await
        .context("Text scan failed")?;

    let report = ScanReport::new(
        &args.image,
        image.width(),
        image.height(),
        detection_model.is_some(),
        &result,
    );
    let json = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", json);

    Ok(())
}

/// Print which models load with the given paths
pub async fn list_models(args: ModelsArgs) -> Result<()> {
    dotenv::dotenv().ok();

    let config = ScanConfig::default();
    let manager = VisionModelManager::new(
        VisionModelConfig {
            detection_model_path: Some(args.model),
            enable_ocr: true,
            tessdata_dir: args.tessdata.map(|dir| dir.display().to_string()),
        },
        &config,
    )
    .await?;

    for model in manager.list_models() {
        let status = if model.available { "✅" } else { "❌" };
        println!("{} {} ({})", status, model.name, model.model_type);
    }

    Ok(())
}
