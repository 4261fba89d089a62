// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the EAST text detector

use image::{imageops::FilterType, DynamicImage, RgbaImage};
use ndarray::Array4;

use super::tensors::TensorLayout;

/// Resize an image to the detector's working resolution
///
/// The image is stretched to `size x size` without preserving aspect ratio.
/// Boxes found by the detector are in this resized space, and crops are taken
/// from the returned buffer, so callers should keep it around for the OCR
/// pass.
pub fn prepare_image(image: &DynamicImage, size: u32) -> RgbaImage {
    if image.width() == size && image.height() == size {
        return image.to_rgba8();
    }
    image.resize_exact(size, size, FilterType::Triangle).to_rgba8()
}

/// Convert an RGBA image into a detector input tensor
///
/// EAST takes raw RGB values in 0-255 as `f32`, with no mean/std
/// normalization. Alpha is dropped.
pub fn image_to_tensor(image: &RgbaImage, layout: TensorLayout) -> Array4<f32> {
    let (width, height) = (image.width() as usize, image.height() as usize);

    let mut tensor = match layout {
        TensorLayout::Nhwc => Array4::zeros((1, height, width, 3)),
        TensorLayout::Nchw => Array4::zeros((1, 3, height, width)),
    };

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32;
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    tensor
}
