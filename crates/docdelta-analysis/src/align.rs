// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document-level page alignment.
//
// Pages are paired by fingerprint similarity with a bounded lookahead so
// inserted and deleted pages do not shift every later pairing. Consecutive
// pages of the same kind (paired, base-only, compare-only) are grouped into
// `DocumentPair`s.

use docdelta_core::{DocumentPair, EngineConfig, PageMapping, PageRange};
use tracing::{debug, info, instrument};

use crate::fingerprint::PageFingerprint;

/// Minimum fingerprint similarity for two pages to be paired.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Pages searched ahead on each side after a mismatch.
pub const DEFAULT_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Paired { base: usize, compare: usize, similarity: f64 },
    BaseOnly(usize),
    CompareOnly(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Paired,
    BaseOnly,
    CompareOnly,
}

impl Step {
    fn kind(&self) -> Kind {
        match self {
            Step::Paired { .. } => Kind::Paired,
            Step::BaseOnly(_) => Kind::BaseOnly,
            Step::CompareOnly(_) => Kind::CompareOnly,
        }
    }

    fn mapping(&self) -> PageMapping {
        let page = |idx: usize| Some(idx as u32 + 1);
        let (base_page_number, compare_page_number, similarity_score) = match *self {
            Step::Paired {
                base,
                compare,
                similarity,
            } => (page(base), page(compare), similarity),
            Step::BaseOnly(base) => (page(base), None, 0.0),
            Step::CompareOnly(compare) => (None, page(compare), 0.0),
        };
        PageMapping {
            base_page_number,
            compare_page_number,
            similarity_score,
            difference_count: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentAligner {
    threshold: f64,
    window: usize,
}

impl Default for DocumentAligner {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window: DEFAULT_WINDOW,
        }
    }
}

impl DocumentAligner {
    pub fn new(threshold: f64, window: usize) -> Self {
        Self { threshold, window }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.match_threshold, config.lookahead_window)
    }

    /// Align two documents page by page.
    ///
    /// With `smart` off, pages pair by index and the longer document's tail
    /// becomes a one-sided pair. Every page of both documents appears in
    /// exactly one mapping.
    #[instrument(skip_all, fields(base_pages = base.len(), compare_pages = compare.len(), smart = smart))]
    pub fn align(&self, base: &[PageFingerprint], compare: &[PageFingerprint], smart: bool) -> Vec<DocumentPair> {
        let steps = if smart {
            self.smart_steps(base, compare)
        } else {
            naive_steps(base, compare)
        };

        let paired = steps.iter().filter(|s| s.kind() == Kind::Paired).count();
        if smart && paired == 0 && !base.is_empty() && !compare.is_empty() {
            info!("no page pair reached the match threshold; reporting documents as unmatched");
            return vec![unmatched_whole(base.len(), compare.len())];
        }

        let pairs = group(steps);
        debug!(pairs = pairs.len(), paired_pages = paired, "alignment complete");
        pairs
    }

    fn smart_steps(&self, base: &[PageFingerprint], compare: &[PageFingerprint]) -> Vec<Step> {
        let (n, m) = (base.len(), compare.len());
        let mut steps = Vec::with_capacity(n.max(m));
        let (mut i, mut j) = (0usize, 0usize);

        while i < n && j < m {
            let similarity = base[i].similarity(&compare[j]);
            if similarity >= self.threshold {
                steps.push(Step::Paired {
                    base: i,
                    compare: j,
                    similarity,
                });
                i += 1;
                j += 1;
                continue;
            }

            match self.next_match(base, compare, i, j) {
                Some((di, dj)) => {
                    steps.extend((i..i + di).map(Step::BaseOnly));
                    steps.extend((j..j + dj).map(Step::CompareOnly));
                    i += di;
                    j += dj;
                }
                None => {
                    steps.push(Step::BaseOnly(i));
                    steps.push(Step::CompareOnly(j));
                    i += 1;
                    j += 1;
                }
            }
        }
        steps.extend((i..n).map(Step::BaseOnly));
        steps.extend((j..m).map(Step::CompareOnly));
        steps
    }

    /// Closest pair `(i + di, j + dj)` inside the window that reaches the
    /// threshold. Smaller `di + dj` wins, then higher similarity.
    fn next_match(
        &self,
        base: &[PageFingerprint],
        compare: &[PageFingerprint],
        i: usize,
        j: usize,
    ) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for di in 0..=self.window {
            if i + di >= base.len() {
                break;
            }
            for dj in 0..=self.window {
                if (di, dj) == (0, 0) {
                    continue;
                }
                if j + dj >= compare.len() {
                    break;
                }
                let similarity = base[i + di].similarity(&compare[j + dj]);
                if similarity < self.threshold {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((bdi, bdj, bsim)) => {
                        let (cost, best_cost) = (di + dj, bdi + bdj);
                        cost < best_cost || (cost == best_cost && similarity > bsim)
                    }
                };
                if better {
                    best = Some((di, dj, similarity));
                }
            }
        }
        best.map(|(di, dj, _)| (di, dj))
    }
}

fn naive_steps(base: &[PageFingerprint], compare: &[PageFingerprint]) -> Vec<Step> {
    let common = base.len().min(compare.len());
    let mut steps: Vec<Step> = (0..common)
        .map(|k| Step::Paired {
            base: k,
            compare: k,
            similarity: base[k].similarity(&compare[k]),
        })
        .collect();
    steps.extend((common..base.len()).map(Step::BaseOnly));
    steps.extend((common..compare.len()).map(Step::CompareOnly));
    steps
}

/// Group steps into document pairs. Between two paired runs, all base-only
/// pages form one pair and all compare-only pages another.
fn group(steps: Vec<Step>) -> Vec<DocumentPair> {
    let mut pairs = Vec::new();
    let mut paired: Vec<Step> = Vec::new();
    let mut base_only: Vec<Step> = Vec::new();
    let mut compare_only: Vec<Step> = Vec::new();

    for step in steps {
        match step.kind() {
            Kind::Paired => {
                flush(&mut pairs, &mut base_only);
                flush(&mut pairs, &mut compare_only);
                paired.push(step);
            }
            Kind::BaseOnly => {
                flush(&mut pairs, &mut paired);
                base_only.push(step);
            }
            Kind::CompareOnly => {
                flush(&mut pairs, &mut paired);
                compare_only.push(step);
            }
        }
    }
    flush(&mut pairs, &mut paired);
    flush(&mut pairs, &mut base_only);
    flush(&mut pairs, &mut compare_only);
    pairs
}

fn flush(pairs: &mut Vec<DocumentPair>, run: &mut Vec<Step>) {
    if run.is_empty() {
        return;
    }
    let steps = std::mem::take(run);
    let mappings: Vec<PageMapping> = steps.iter().map(Step::mapping).collect();
    let base_pages: Vec<u32> = mappings.iter().filter_map(|m| m.base_page_number).collect();
    let compare_pages: Vec<u32> = mappings.iter().filter_map(|m| m.compare_page_number).collect();
    let matched = steps[0].kind() == Kind::Paired;
    let similarity_score = if matched {
        mappings.iter().map(|m| m.similarity_score).sum::<f64>() / mappings.len() as f64
    } else {
        0.0
    };

    pairs.push(DocumentPair {
        pair_index: pairs.len() as u32,
        matched,
        has_base_document: !base_pages.is_empty(),
        has_compare_document: !compare_pages.is_empty(),
        base_range: range_of(&base_pages),
        compare_range: range_of(&compare_pages),
        base_page_count: base_pages.len() as u32,
        compare_page_count: compare_pages.len() as u32,
        similarity_score,
        total_differences: 0,
        page_mappings: mappings,
    });
}

fn range_of(pages: &[u32]) -> Option<PageRange> {
    let start = *pages.iter().min()?;
    let end = *pages.iter().max()?;
    Some(PageRange::new(start, end))
}

fn unmatched_whole(n: usize, m: usize) -> DocumentPair {
    let mut mappings: Vec<PageMapping> = (0..n).map(|i| Step::BaseOnly(i).mapping()).collect();
    mappings.extend((0..m).map(|j| Step::CompareOnly(j).mapping()));
    DocumentPair {
        pair_index: 0,
        matched: false,
        has_base_document: true,
        has_compare_document: true,
        base_range: Some(PageRange::new(1, n as u32)),
        compare_range: Some(PageRange::new(1, m as u32)),
        base_page_count: n as u32,
        compare_page_count: m as u32,
        similarity_score: 0.0,
        total_differences: 0,
        page_mappings: mappings,
    }
}
