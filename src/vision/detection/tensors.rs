// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Typed detector output
//!
//! The EAST detector produces two grids per image: a single-channel confidence
//! map and a five-channel geometry map (top/right/bottom/left distances plus
//! rotation angle). Both are held here in `[batch, channel, row, col]` layout.

use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};

use crate::vision::error::{VisionError, VisionResult};

/// Number of channels in the geometry grid
pub const GEOMETRY_CHANNELS: usize = 5;

/// Memory layout of a 4D image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[batch, row, col, channel]`, as exported by TensorFlow / TFLite
    #[default]
    Nhwc,
    /// `[batch, channel, row, col]`
    Nchw,
}

impl TensorLayout {
    /// Axis holding the channel dimension
    pub fn channel_axis(self) -> usize {
        match self {
            TensorLayout::Nhwc => 3,
            TensorLayout::Nchw => 1,
        }
    }

    /// Reorder an array in this layout into `[batch, channel, row, col]`
    pub fn to_nchw(self, array: Array4<f32>) -> Array4<f32> {
        match self {
            TensorLayout::Nhwc => array.permuted_axes([0, 3, 1, 2]),
            TensorLayout::Nchw => array,
        }
    }
}

/// Confidence and geometry grids for one detector run
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    scores: Array4<f32>,
    geometry: Array4<f32>,
}

impl DetectionOutput {
    /// Wrap grids already in `[batch, channel, row, col]` layout
    ///
    /// Shapes are checked here so the decoder can index without bounds
    /// surprises. Grids with zero cells are accepted as-is and decode to
    /// nothing.
    pub fn new(scores: Array4<f32>, geometry: Array4<f32>) -> VisionResult<Self> {
        if scores.is_empty() || geometry.is_empty() {
            return Ok(Self { scores, geometry });
        }

        let (score_batch, score_channels, rows, cols) = scores.dim();
        let (geo_batch, geo_channels, geo_rows, geo_cols) = geometry.dim();

        if score_channels != 1 {
            return Err(VisionError::invalid_shape(
                "confidence",
                scores.shape(),
                "expected exactly 1 channel",
            ));
        }
        if geo_channels != GEOMETRY_CHANNELS {
            return Err(VisionError::invalid_shape(
                "geometry",
                geometry.shape(),
                format!("expected {} channels", GEOMETRY_CHANNELS),
            ));
        }
        if score_batch != geo_batch || rows != geo_rows || cols != geo_cols {
            return Err(VisionError::invalid_shape(
                "geometry",
                geometry.shape(),
                format!(
                    "grid does not match confidence grid {:?}",
                    scores.shape()
                ),
            ));
        }

        Ok(Self { scores, geometry })
    }

    /// Wrap grids in `[batch, row, col, channel]` layout, transposing them first
    pub fn from_nhwc(scores: Array4<f32>, geometry: Array4<f32>) -> VisionResult<Self> {
        Self::from_layout(scores, geometry, TensorLayout::Nhwc)
    }

    pub fn from_layout(
        scores: Array4<f32>,
        geometry: Array4<f32>,
        layout: TensorLayout,
    ) -> VisionResult<Self> {
        Self::new(layout.to_nchw(scores), layout.to_nchw(geometry))
    }

    /// Pick the confidence and geometry grids out of raw model outputs
    ///
    /// Output order differs between exports of the same network, so the
    /// grids are told apart by channel count rather than by position.
    pub fn from_model_outputs(
        outputs: Vec<Array4<f32>>,
        layout: TensorLayout,
    ) -> VisionResult<Self> {
        let axis = Axis(layout.channel_axis());
        let mut scores = None;
        let mut geometry = None;

        for output in outputs {
            match output.len_of(axis) {
                1 if scores.is_none() => scores = Some(output),
                GEOMETRY_CHANNELS if geometry.is_none() => geometry = Some(output),
                _ => {
                    return Err(VisionError::invalid_shape(
                        "detector output",
                        output.shape(),
                        "expected one 1-channel and one 5-channel grid",
                    ))
                }
            }
        }

        match (scores, geometry) {
            (Some(scores), Some(geometry)) => Self::from_layout(scores, geometry, layout),
            _ => Err(VisionError::Inference(
                "detector did not return both confidence and geometry grids".to_string(),
            )),
        }
    }

    /// An output with no grid cells
    pub fn empty() -> Self {
        Self {
            scores: Array4::zeros((1, 1, 0, 0)),
            geometry: Array4::zeros((1, GEOMETRY_CHANNELS, 0, 0)),
        }
    }

    pub fn scores(&self) -> &Array4<f32> {
        &self.scores
    }

    pub fn geometry(&self) -> &Array4<f32> {
        &self.geometry
    }

    /// `true` when either grid has no cells
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() || self.geometry.is_empty()
    }

    /// Grid size as `(rows, cols)`
    pub fn grid_size(&self) -> (usize, usize) {
        let (_, _, rows, cols) = self.scores.dim();
        (rows, cols)
    }
}
