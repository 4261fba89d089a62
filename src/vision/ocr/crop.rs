// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cutting text boxes out of the source image

use image::{imageops, RgbaImage};

use crate::vision::detection::TextBox;
use crate::vision::error::{VisionError, VisionResult};

/// A crop may be at most this many times the source size along each axis
pub const MAX_CROP_SCALE: u32 = 4;

/// Integer pixel bounds of a box, each coordinate rounded up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl From<&TextBox> for PixelRegion {
    fn from(bbox: &TextBox) -> Self {
        // Float to int casts saturate, NaN becomes 0
        Self {
            x: bbox.x.ceil() as i64,
            y: bbox.y.ceil() as i64,
            width: bbox.width.ceil().max(0.0) as u32,
            height: bbox.height.ceil().max(0.0) as u32,
        }
    }
}

impl PixelRegion {
    /// Part of the region inside a `width x height` image, as `(x, y, w, h)`
    fn overlap(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self
            .x
            .saturating_add(i64::from(self.width))
            .min(i64::from(width));
        let bottom = self
            .y
            .saturating_add(i64::from(self.height))
            .min(i64::from(height));

        if right <= left || bottom <= top {
            return None;
        }
        // All four values lie within [0, u32::MAX] here
        Some((
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// Copy the region under `bbox` into a new `ceil(width) x ceil(height)` image
///
/// Bounds are not checked against the source. Any part of the region that
/// falls outside it stays fully transparent, so an out-of-range box produces a
/// partly or fully blank crop. Regions larger than [`MAX_CROP_SCALE`] times
/// the source are refused with [`VisionError::RegionTooLarge`].
pub fn crop_region(source: &RgbaImage, bbox: &TextBox) -> VisionResult<RgbaImage> {
    let region = PixelRegion::from(bbox);

    let max_width = source.width().max(1).saturating_mul(MAX_CROP_SCALE);
    let max_height = source.height().max(1).saturating_mul(MAX_CROP_SCALE);
    if region.width > max_width || region.height > max_height {
        return Err(VisionError::RegionTooLarge {
            width: region.width,
            height: region.height,
            max_width,
            max_height,
        });
    }

    let mut cropped = RgbaImage::new(region.width, region.height);

    if let Some((x, y, width, height)) = region.overlap(source.width(), source.height()) {
        let visible = imageops::crop_imm(source, x, y, width, height).to_image();
        // Offset of the visible part inside the crop, bounded by the crop size
        let dx = i64::from(x).saturating_sub(region.x);
        let dy = i64::from(y).saturating_sub(region.y);
        imageops::replace(&mut cropped, &visible, dx, dy);
    }

    Ok(cropped)
}
