// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! EAST geometry decoding
//!
//! Each grid cell above the confidence threshold predicts the distances from
//! its receptive-field origin to the four edges of a (possibly rotated) text
//! box plus the rotation angle. Decoding rotates the right/bottom distances to
//! find the far corner and backs off by the box size to get an axis-aligned
//! box.

use tracing::debug;

use super::geometry::{ScoredBox, TextBox};
use super::tensors::DetectionOutput;
use crate::config::DecoderConfig;

const TOP: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const LEFT: usize = 3;
const ANGLE: usize = 4;

/// Turns detector grids into candidate boxes
#[derive(Debug, Clone, Default)]
pub struct GeometryDecoder {
    config: DecoderConfig,
}

impl GeometryDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode every cell scoring above the threshold
    ///
    /// Boxes come out in raster order (row by row, left to right) and are not
    /// sorted by score. Only batch 0 is read.
    pub fn decode(&self, output: &DetectionOutput) -> Vec<ScoredBox> {
        if output.is_empty() {
            return Vec::new();
        }

        let scores = output.scores();
        let geometry = output.geometry();
        let (rows, cols) = output.grid_size();
        let stride = self.config.grid_stride as f32;

        let mut boxes = Vec::new();

        for y in 0..rows {
            for x in 0..cols {
                let score = scores[[0, 0, y, x]];
                // NaN scores never pass
                if !(score > self.config.threshold) {
                    continue;
                }

                let top = geometry[[0, TOP, y, x]];
                let right = geometry[[0, RIGHT, y, x]];
                let bottom = geometry[[0, BOTTOM, y, x]];
                let left = geometry[[0, LEFT, y, x]];
                let angle = geometry[[0, ANGLE, y, x]];

                let (sin, cos) = angle.sin_cos();
                let height = top + bottom;
                let width = right + left;

                let origin_x = x as f32 * stride;
                let origin_y = y as f32 * stride;

                let end_x = origin_x + cos * right + sin * bottom;
                let end_y = origin_y - sin * right + cos * bottom;

                let bbox = TextBox::new(end_x - width, end_y - height, width, height);
                if !bbox.is_valid() {
                    continue;
                }

                boxes.push(ScoredBox::new(bbox, score));
            }
        }

        debug!(
            "Decoded {} candidate boxes from {}x{} grid",
            boxes.len(),
            rows,
            cols
        );

        boxes
    }
}
