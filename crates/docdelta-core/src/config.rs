// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration and per-comparison options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CompareError, Result};

/// Engine-wide settings shared by every comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool size. `None` means `min(cores / 2, 4)`.
    pub worker_threads: Option<usize>,
    /// Deadline for the whole batch of page tasks, in seconds.
    pub aggregate_deadline_secs: u64,
    /// Attempts per page task before a placeholder is substituted.
    pub max_attempts: u32,
    /// An attempt slower than this is not retried, in seconds.
    pub attempt_timeout_secs: u64,
    /// Base delay between attempts (doubles each retry), in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds.
    pub retry_max_delay_ms: u64,
    /// DPI used for the full-quality page render.
    pub render_dpi: u32,
    /// DPI used for the cheap render that feeds page fingerprints.
    pub fingerprint_dpi: u32,
    /// Minimum fingerprint similarity for two pages to be aligned.
    pub match_threshold: f64,
    /// How many pages ahead the aligner looks on each side.
    pub lookahead_window: usize,
    /// Default magnitude cutoff for image and style differences.
    pub difference_threshold: f64,
    /// Page count above which sparse sampling kicks in.
    pub sampling_page_threshold: u32,
    /// Pages always processed at the start and end of a sampled document.
    pub sampling_edge_pages: u32,
    /// Every Nth page in the middle of a sampled document is processed.
    pub sampling_stride: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            aggregate_deadline_secs: 300,
            max_attempts: 3,
            attempt_timeout_secs: 60,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 1_000,
            render_dpi: 150,
            fingerprint_dpi: 36,
            match_threshold: 0.5,
            lookahead_window: 10,
            difference_threshold: 0.05,
            sampling_page_threshold: 100,
            sampling_edge_pages: 10,
            sampling_stride: 10,
        }
    }
}

/// Text differencing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextComparisonMethod {
    /// Line tokens, LCS alignment.
    Exact,
    /// Whitespace tokens, bounded-lookahead greedy alignment.
    #[default]
    Smart,
    /// Characters, full LCS. Quadratic; meant for short strings.
    Character,
}

impl TextComparisonMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "smart" | "word" => Some(Self::Smart),
            "character" | "char" => Some(Self::Character),
            _ => None,
        }
    }
}

/// Option keys understood on a comparison's string map.
pub mod keys {
    pub const TEXT_COMPARISON_METHOD: &str = "textComparisonMethod";
    pub const DIFFERENCE_THRESHOLD: &str = "differenceThreshold";
    pub const SMART_MATCHING: &str = "smartMatching";
    pub const EXHAUSTIVE_PROCESSING: &str = "exhaustiveProcessing";
}

/// Typed view of a comparison's string→string options.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOptions {
    pub text_method: TextComparisonMethod,
    /// Overrides [`EngineConfig::difference_threshold`] when set.
    pub difference_threshold: Option<f64>,
    /// Lookahead alignment instead of naive index alignment.
    pub smart_matching: bool,
    /// Process every page even for very long documents.
    pub exhaustive: bool,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            text_method: TextComparisonMethod::Smart,
            difference_threshold: None,
            smart_matching: true,
            exhaustive: false,
        }
    }
}

impl ComparisonOptions {
    /// Parse the option map. Unknown keys are ignored; unparseable values
    /// are logged and replaced by their defaults.
    pub fn from_map(options: &BTreeMap<String, String>) -> Self {
        let mut parsed = Self::default();
        for (key, raw) in options {
            if let Err(err) = parsed.apply(key, raw) {
                warn!(%err, "keeping the default");
            }
        }
        parsed
    }

    /// Like [`ComparisonOptions::from_map`], but the first unparseable value
    /// is an `InvalidOption` error.
    pub fn try_from_map(options: &BTreeMap<String, String>) -> Result<Self> {
        let mut parsed = Self::default();
        for (key, raw) in options {
            parsed.apply(key, raw)?;
        }
        Ok(parsed)
    }

    fn apply(&mut self, key: &str, raw: &str) -> Result<()> {
        let invalid = || CompareError::InvalidOption {
            key: key.to_string(),
            value: raw.to_string(),
        };
        match key {
            keys::TEXT_COMPARISON_METHOD => {
                self.text_method = TextComparisonMethod::from_name(raw).ok_or_else(invalid)?;
            }
            keys::DIFFERENCE_THRESHOLD => {
                let value = raw.trim().parse::<f64>().map_err(|_| invalid())?;
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(invalid());
                }
                self.difference_threshold = Some(value);
            }
            keys::SMART_MATCHING => self.smart_matching = parse_bool(raw).ok_or_else(invalid)?,
            keys::EXHAUSTIVE_PROCESSING => self.exhaustive = parse_bool(raw).ok_or_else(invalid)?,
            _ => {}
        }
        Ok(())
    }

    /// Effective image/style magnitude cutoff.
    pub fn threshold(&self, config: &EngineConfig) -> f64 {
        self.difference_threshold
            .unwrap_or(config.difference_threshold)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
