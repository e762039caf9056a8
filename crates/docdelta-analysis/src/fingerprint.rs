// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page fingerprints: cheap summaries of a page's text and appearance used to
// align pages before any expensive differencing runs.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::image::phash::{NEUTRAL_SIMILARITY, PerceptualHash, perceptual_hash};

/// Number of token hashes kept in the bottom-k sketch.
pub const SKETCH_SIZE: usize = 256;

const TEXT_WEIGHT: f64 = 0.6;
const VISUAL_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFingerprint {
    /// SHA-256 of the whitespace-normalized page text, hex.
    pub text_digest: String,
    /// Smallest hashes of the page's distinct lowercased words, ascending.
    pub sketch: Vec<u64>,
    /// Perceptual hash of the low-resolution render, if one was available.
    pub visual_hash: Option<PerceptualHash>,
    pub word_count: usize,
}

impl PageFingerprint {
    pub fn new(text: &str, render: Option<&DynamicImage>) -> Self {
        Self::from_parts(text, render.and_then(perceptual_hash))
    }

    pub fn from_parts(text: &str, visual_hash: Option<PerceptualHash>) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        let normalized = words.join(" ");

        let mut sketch: Vec<u64> = words
            .iter()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .map(|w| token_hash(&w))
            .collect();
        sketch.sort_unstable();
        sketch.dedup();
        sketch.truncate(SKETCH_SIZE);

        Self {
            text_digest: hex::encode(Sha256::digest(normalized.as_bytes())),
            sketch,
            visual_hash,
            word_count: words.len(),
        }
    }

    pub fn has_text(&self) -> bool {
        self.word_count > 0
    }

    /// Text similarity in [0, 1]: 1 for equal digests, 0 when exactly one
    /// page has text, otherwise the Jaccard estimate of the two sketches.
    pub fn text_similarity(&self, other: &PageFingerprint) -> f64 {
        if self.text_digest == other.text_digest {
            return 1.0;
        }
        if self.has_text() != other.has_text() {
            return 0.0;
        }
        jaccard(&self.sketch, &other.sketch)
    }

    /// Visual similarity in [0, 1]; two missing renders agree, one missing
    /// render is neutral.
    pub fn visual_similarity(&self, other: &PageFingerprint) -> f64 {
        match (self.visual_hash, other.visual_hash) {
            (Some(a), Some(b)) => a.similarity(&b),
            (None, None) => 1.0,
            _ => NEUTRAL_SIMILARITY,
        }
    }

    pub fn similarity(&self, other: &PageFingerprint) -> f64 {
        if self.text_digest == other.text_digest && self.visual_hash == other.visual_hash {
            return 1.0;
        }
        // Two empty digests would agree on nothing but absence.
        if !self.has_text() && !other.has_text() {
            return self.visual_similarity(other);
        }
        TEXT_WEIGHT * self.text_similarity(other) + VISUAL_WEIGHT * self.visual_similarity(other)
    }
}

fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Bottom-k Jaccard estimate over two ascending, deduplicated sketches.
fn jaccard(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let (mut i, mut j) = (0, 0);
    let (mut union, mut shared) = (0usize, 0usize);
    while union < SKETCH_SIZE && (i < a.len() || j < b.len()) {
        match (a.get(i), b.get(j)) {
            (Some(x), Some(y)) if x == y => {
                shared += 1;
                i += 1;
                j += 1;
            }
            (Some(x), Some(y)) if x < y => i += 1,
            (Some(_), Some(_)) => j += 1,
            (Some(_), None) => i += 1,
            (None, Some(_)) => j += 1,
            (None, None) => break,
        }
        union += 1;
    }
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_pages_are_fully_similar() {
        let a = PageFingerprint::from_parts("Quarterly report", Some(PerceptualHash(42)));
        let b = PageFingerprint::from_parts("Quarterly   report", Some(PerceptualHash(42)));
        assert_eq!(a.similarity(&b), 1.0);
    }

    #[test]
    fn appended_word_stays_above_alignment_threshold() {
        let blank = Some(PerceptualHash(0));
        let a = PageFingerprint::from_parts("Hello", blank);
        let b = PageFingerprint::from_parts("Hello World", blank);
        assert!((a.text_similarity(&b) - 0.5).abs() < 1e-9);
        assert!(a.similarity(&b) >= 0.5);
    }

    #[test]
    fn unrelated_text_falls_below_threshold() {
        let blank = Some(PerceptualHash(0));
        let a = PageFingerprint::from_parts("alpha beta gamma", blank);
        let b = PageFingerprint::from_parts("delta epsilon zeta", blank);
        assert!(a.similarity(&b) < 0.5);
    }

    #[test]
    fn text_on_one_side_only_has_no_text_similarity() {
        let a = PageFingerprint::from_parts("", None);
        let b = PageFingerprint::from_parts("content", None);
        assert_eq!(a.text_similarity(&b), 0.0);
        assert_eq!(a.visual_similarity(&b), 1.0);
    }

    #[test]
    fn pages_without_text_are_judged_on_appearance_alone() {
        let scan = PageFingerprint::from_parts("", Some(PerceptualHash(0)));
        let other_scan = PageFingerprint::from_parts("", Some(PerceptualHash(u64::MAX)));
        let near_scan = PageFingerprint::from_parts("", Some(PerceptualHash(0b111)));
        assert_eq!(scan.similarity(&other_scan), 0.0);
        assert!((scan.similarity(&near_scan) - 61.0 / 64.0).abs() < 1e-9);
    }

    #[test]
    fn sketches_are_bounded_and_sorted() {
        let text: String = (0..1000).map(|i| format!("w{i} ")).collect();
        let fp = PageFingerprint::from_parts(&text, None);
        assert_eq!(fp.sketch.len(), SKETCH_SIZE);
        assert!(fp.sketch.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(fp.word_count, 1000);
    }

    #[test]
    fn jaccard_is_exact_for_small_sets() {
        assert_eq!(jaccard(&[1, 2, 3], &[2, 3, 4]), 0.5);
        assert_eq!(jaccard(&[], &[]), 1.0);
    }
}
