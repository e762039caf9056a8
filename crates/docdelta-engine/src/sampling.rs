// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sparse sampling of page mappings for very long documents.

use docdelta_core::EngineConfig;

/// Which aligned positions get a full page comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPlan {
    selected: Vec<bool>,
}

impl SamplingPlan {
    /// Every position is processed.
    pub fn exhaustive(positions: usize) -> Self {
        Self {
            selected: vec![true; positions],
        }
    }

    /// Above the configured page threshold, keep the first and last
    /// `sampling_edge_pages` positions plus every `sampling_stride`th one in
    /// between. `page_count` is the larger of the two documents.
    pub fn for_documents(positions: usize, page_count: u32, exhaustive: bool, config: &EngineConfig) -> Self {
        if exhaustive || page_count <= config.sampling_page_threshold {
            return Self::exhaustive(positions);
        }
        let edge = config.sampling_edge_pages as usize;
        let stride = config.sampling_stride.max(1) as usize;
        let selected = (0..positions)
            .map(|i| i < edge || i + edge >= positions || i % stride == 0)
            .collect();
        Self { selected }
    }

    pub fn is_selected(&self, position: usize) -> bool {
        self.selected.get(position).copied().unwrap_or(false)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }

    pub fn is_sampled(&self) -> bool {
        self.selected_count() < self.selected.len()
    }
}
