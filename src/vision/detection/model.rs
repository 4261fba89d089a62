// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! EAST text detection model
//!
//! This module provides the detection service used by the scan pipeline.
//! The pipeline only sees the [`TextDetectionModel`] trait; the ONNX Runtime
//! backed [`EastDetectionModel`] is the production implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbaImage;
use ndarray::{Array4, Ix4};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::image_to_tensor;
use super::tensors::{DetectionOutput, TensorLayout};
use crate::config::PreprocessConfig;
use crate::vision::error::{VisionError, VisionResult};

/// Detection model service
///
/// Implementations return confidence and geometry grids already in
/// `[batch, channel, row, col]` layout. Handles are shared read-only across
/// pipeline runs.
#[async_trait]
pub trait TextDetectionModel: Send + Sync {
    async fn predict(&self, image: &RgbaImage) -> VisionResult<DetectionOutput>;
}

/// EAST text detector running on ONNX Runtime
///
/// Uses the CPU execution provider; the session is shared behind a mutex.
#[derive(Clone)]
pub struct EastDetectionModel {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Input size and tensor layout
    preprocess: PreprocessConfig,
}

impl std::fmt::Debug for EastDetectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EastDetectionModel")
            .field("input_name", &self.input_name)
            .field("preprocess", &self.preprocess)
            .finish_non_exhaustive()
    }
}

impl EastDetectionModel {
    /// Load the EAST detection model from a file
    ///
    /// # Arguments
    /// - `model_path`: Path to the ONNX model file
    /// - `preprocess`: Input size and the layout the model was exported with
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub async fn new<P: AsRef<Path>>(model_path: P, preprocess: PreprocessConfig) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!(
                "EAST detection model not found: {}",
                model_path.display()
            );
        }

        info!("Loading EAST detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load EAST detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input_images".to_string());

        if session.outputs.len() < 2 {
            anyhow::bail!(
                "EAST detection model must have confidence and geometry outputs, found {}",
                session.outputs.len()
            );
        }

        debug!(
            "Detection model loaded - input: {}, outputs: {:?}",
            input_name,
            session
                .outputs
                .iter()
                .map(|output| output.name.as_str())
                .collect::<Vec<_>>()
        );

        info!("✅ EAST detection model loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            preprocess,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.preprocess.input_size
    }

    fn run_session(&self, input: Array4<f32>) -> Result<Vec<Array4<f32>>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Detection session lock poisoned"))?;

        let input_value = Value::from_array(input).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let mut grids = Vec::with_capacity(outputs.len());
        for index in 0..outputs.len() {
            let grid = outputs[index]
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?
                .to_owned()
                .into_dimensionality::<Ix4>()
                .context("Detection output is not 4-dimensional")?;
            debug!("Detection output {} shape: {:?}", index, grid.shape());
            grids.push(grid);
        }

        Ok(grids)
    }
}

#[async_trait]
impl TextDetectionModel for EastDetectionModel {
    async fn predict(&self, image: &RgbaImage) -> VisionResult<DetectionOutput> {
        let size = self.preprocess.input_size;
        if image.dimensions() != (size, size) {
            return Err(VisionError::Inference(format!(
                "expected a {}x{} image, got {}x{}",
                size,
                size,
                image.width(),
                image.height()
            )));
        }

        let input = image_to_tensor(image, self.preprocess.layout);
        let grids = self
            .run_session(input)
            .map_err(|e| VisionError::Inference(format!("{:#}", e)))?;

        DetectionOutput::from_model_outputs(grids, self.preprocess.layout)
    }
}

/// Layout-agnostic adapter for precomputed grids
///
/// Useful when detection runs elsewhere and only the raw output is at hand.
#[derive(Debug, Clone)]
pub struct PrecomputedDetection {
    output: DetectionOutput,
}

impl PrecomputedDetection {
    pub fn new(output: DetectionOutput) -> Self {
        Self { output }
    }

    pub fn from_grids(
        scores: Array4<f32>,
        geometry: Array4<f32>,
        layout: TensorLayout,
    ) -> VisionResult<Self> {
        Ok(Self::new(DetectionOutput::from_layout(scores, geometry, layout)?))
    }
}

#[async_trait]
impl TextDetectionModel for PrecomputedDetection {
    async fn predict(&self, _image: &RgbaImage) -> VisionResult<DetectionOutput> {
        Ok(self.output.clone())
    }
}
