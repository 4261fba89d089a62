// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Greedy non-maximum suppression over axis-aligned boxes

use tracing::debug;

use super::geometry::{ScoredBox, TextBox};
use crate::config::SuppressionConfig;

/// Keeps the most confident boxes and drops the ones overlapping them
#[derive(Debug, Clone, Default)]
pub struct BoxSuppressor {
    config: SuppressionConfig,
}

impl BoxSuppressor {
    pub fn new(config: SuppressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuppressionConfig {
        &self.config
    }

    /// Select at most `max_boxes` boxes in descending score order
    ///
    /// A candidate is dropped when its IoU with any already selected box is
    /// strictly greater than `iou_threshold`. Candidates with equal scores
    /// keep their input order. Scores are discarded from the output.
    pub fn suppress(&self, mut candidates: Vec<ScoredBox>) -> Vec<TextBox> {
        if candidates.is_empty() || self.config.max_boxes == 0 {
            return Vec::new();
        }

        // Stable sort so ties keep raster order
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept: Vec<TextBox> = Vec::with_capacity(self.config.max_boxes.min(candidates.len()));

        for candidate in &candidates {
            if kept.len() >= self.config.max_boxes {
                break;
            }

            let overlaps = kept
                .iter()
                .any(|selected| selected.iou(&candidate.bbox) > self.config.iou_threshold);

            if !overlaps {
                kept.push(candidate.bbox);
            }
        }

        debug!(
            "Suppression kept {} of {} candidate boxes",
            kept.len(),
            candidates.len()
        );

        kept
    }
}
