// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! EAST text detection
//!
//! Components:
//! - `model` - Detection model service and the ONNX Runtime implementation
//! - `preprocessing` - Working-resolution resize and input tensor conversion
//! - `tensors` - Typed confidence/geometry grids with shape checks
//! - `decoder` - Grid cells to candidate boxes
//! - `suppression` - Non-maximum suppression of overlapping candidates
//! - `geometry` - Box types

pub mod decoder;
pub mod geometry;
pub mod model;
pub mod preprocessing;
pub mod suppression;
pub mod tensors;

pub use decoder::GeometryDecoder;
pub use geometry::{ScoredBox, TextBox};
pub use model::{EastDetectionModel, PrecomputedDetection, TextDetectionModel};
pub use preprocessing::{image_to_tensor, prepare_image};
pub use suppression::BoxSuppressor;
pub use tensors::{DetectionOutput, TensorLayout, GEOMETRY_CHANNELS};
