// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Axis-aligned text boxes in source-image pixel space

use serde::{Deserialize, Serialize};

/// A text region located by the detector
///
/// Coordinates are in the pixel space of the image handed to the detector.
/// Decoded boxes may start at negative coordinates or extend past the image
/// edge; only `width` and `height` are guaranteed to be positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// X coordinate of top-left corner
    pub x: f32,
    /// Y coordinate of top-left corner
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl TextBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if this text box has a usable, finite extent
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Calculate area of the bounding box
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Intersection-over-union with another box, 0.0 when they do not touch
    pub fn iou(&self, other: &TextBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clip the box to `[0, width] x [0, height]`
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<TextBox> {
        let x0 = self.x.max(0.0);
        let y0 = self.y.max(0.0);
        let x1 = self.right().min(width as f32);
        let y1 = self.bottom().min(height as f32);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(TextBox::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// A candidate box paired with the detector's confidence for it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredBox {
    pub bbox: TextBox,
    /// Detection confidence score (0.0-1.0)
    pub score: f32,
}

impl ScoredBox {
    pub fn new(bbox: TextBox, score: f32) -> Self {
        Self { bbox, score }
    }
}
