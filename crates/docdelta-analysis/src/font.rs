// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font inventory comparison.

use docdelta_core::{
    ChangeType, DifferenceType, FontDecodeStatus, FontInfo, PageFont, severity,
};
use tracing::{debug, instrument};

use crate::difference::{DifferenceDetail, DifferenceDraft};

/// Matched share below which two inventories are reported as different.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;

const ADDED_OR_REMOVED: f64 = 0.6;
const STYLE_FLAG_CHANGE: f64 = 0.5;
const DAMAGE_CHANGE: f64 = 0.9;
const EMBEDDING_CHANGE: f64 = 0.3;

/// Strip the subset prefix (`ABCDEF+`), the style suffix (after the first
/// `,`) and the version/weight suffix (after the first `-`).
///
/// `"ABCDEF+Arial-Bold,Italic"` becomes `"Arial"`.
pub fn normalize_font_name(name: &str) -> String {
    let name = name.trim();
    let name = match name.split_once('+') {
        Some((_, rest)) => rest,
        None => name,
    };
    let name = name.split(',').next().unwrap_or(name);
    let name = name.split('-').next().unwrap_or(name);
    name.trim().to_string()
}

/// Looser key for family comparison: normalized name, lowercased, without
/// spaces and common foundry/style tails (`ArialMT` and `Arial` share a
/// family).
pub fn font_family(name: &str) -> String {
    let mut family: String = normalize_font_name(name)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    const TAILS: [&str; 8] = ["mt", "ps", "std", "pro", "regular", "bold", "italic", "oblique"];
    loop {
        let before = family.len();
        for tail in TAILS {
            if family.len() > tail.len() && family.ends_with(tail) {
                family.truncate(family.len() - tail.len());
            }
        }
        if family.len() == before {
            break;
        }
    }
    family
}

/// Build the comparable description of a page font.
pub fn font_info(font: &PageFont) -> FontInfo {
    let lowered = font.name.to_lowercase();
    FontInfo {
        font_name: normalize_font_name(&font.name),
        font_family: font_family(&font.name),
        embedded: font.embedded,
        bold: ["bold", "black", "heavy"].iter().any(|w| lowered.contains(w)),
        italic: ["italic", "oblique"].iter().any(|w| lowered.contains(w)),
        encoding: font.encoding.clone(),
        damaged: font.status == FontDecodeStatus::Undecodable,
    }
}

/// Same font: names or families agree and the style and damage flags match.
pub fn same_font(a: &FontInfo, b: &FontInfo) -> bool {
    let named_alike = a.font_name.eq_ignore_ascii_case(&b.font_name)
        || (!a.font_family.is_empty() && a.font_family == b.font_family);
    named_alike && a.bold == b.bold && a.italic == b.italic && a.damaged == b.damaged
}

/// Outcome of comparing two font inventories.
#[derive(Debug, Clone, PartialEq)]
pub struct FontComparison {
    pub has_differences: bool,
    /// Matched fonts over the larger inventory, in [0, 1].
    pub similarity: f64,
    pub font_differences: Vec<DifferenceDraft>,
}

impl FontComparison {
    /// Differences worth reporting; none unless the inventories differ.
    pub fn reported(self) -> Vec<DifferenceDraft> {
        if self.has_differences {
            self.font_differences
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FontDiffer;

impl FontDiffer {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(base = base.len(), compare = compare.len()))]
    pub fn diff(&self, base: &[FontInfo], compare: &[FontInfo]) -> FontComparison {
        if base.is_empty() && compare.is_empty() {
            return FontComparison {
                has_differences: false,
                similarity: 1.0,
                font_differences: Vec::new(),
            };
        }

        let mut base_used = vec![false; base.len()];
        let mut compare_used = vec![false; compare.len()];
        let mut differences = Vec::new();
        let mut matched = 0usize;
        // A font that became (or stopped being) undecodable always counts.
        let mut damage_changed = false;

        for (bi, b) in base.iter().enumerate() {
            let found = (0..compare.len()).find(|&ci| !compare_used[ci] && same_font(b, &compare[ci]));
            if let Some(ci) = found {
                base_used[bi] = true;
                compare_used[ci] = true;
                matched += 1;
                if let Some(draft) = embedding_change(b, &compare[ci]) {
                    differences.push(draft);
                }
            }
        }

        for (bi, b) in base.iter().enumerate() {
            if base_used[bi] {
                continue;
            }
            let found = (0..compare.len())
                .find(|&ci| !compare_used[ci] && b.font_name.eq_ignore_ascii_case(&compare[ci].font_name));
            if let Some(ci) = found {
                base_used[bi] = true;
                compare_used[ci] = true;
                damage_changed |= b.damaged != compare[ci].damaged;
                differences.push(flag_change(b, &compare[ci]));
            }
        }

        for (b, _) in base.iter().zip(&base_used).filter(|(_, used)| !**used) {
            damage_changed |= b.damaged;
            differences.push(presence_change(b, ChangeType::Deleted));
        }
        for (c, _) in compare.iter().zip(&compare_used).filter(|(_, used)| !**used) {
            damage_changed |= c.damaged;
            differences.push(presence_change(c, ChangeType::Added));
        }

        let similarity = matched as f64 / base.len().max(compare.len()) as f64;
        let has_differences = base.len() != compare.len()
            || base.is_empty() != compare.is_empty()
            || similarity < SIMILARITY_THRESHOLD
            || damage_changed;
        debug!(matched, similarity, has_differences, "font inventories compared");

        FontComparison {
            has_differences,
            similarity,
            font_differences: differences,
        }
    }
}

fn presence_change(font: &FontInfo, change: ChangeType) -> DifferenceDraft {
    let verb = if change == ChangeType::Added { "added" } else { "removed" };
    DifferenceDraft::new(
        DifferenceDetail::Font {
            font_name: font.font_name.clone(),
        },
        change,
        severity(DifferenceType::Font, ADDED_OR_REMOVED),
        format!("Font {} {verb}", font.font_name),
    )
}

fn flag_change(base: &FontInfo, compare: &FontInfo) -> DifferenceDraft {
    let mut changes = Vec::new();
    let mut magnitude: f64 = 0.0;
    if base.bold != compare.bold {
        changes.push(if compare.bold { "now bold" } else { "no longer bold" });
        magnitude = magnitude.max(STYLE_FLAG_CHANGE);
    }
    if base.italic != compare.italic {
        changes.push(if compare.italic { "now italic" } else { "no longer italic" });
        magnitude = magnitude.max(STYLE_FLAG_CHANGE);
    }
    if base.damaged != compare.damaged {
        changes.push(if compare.damaged { "now undecodable" } else { "now decodable" });
        magnitude = magnitude.max(DAMAGE_CHANGE);
    }
    DifferenceDraft::new(
        DifferenceDetail::Font {
            font_name: compare.font_name.clone(),
        },
        ChangeType::Modified,
        severity(DifferenceType::Font, magnitude),
        format!("Font {} changed: {}", compare.font_name, changes.join(", ")),
    )
}

fn embedding_change(base: &FontInfo, compare: &FontInfo) -> Option<DifferenceDraft> {
    let mut changes = Vec::new();
    if base.embedded != compare.embedded {
        changes.push(if compare.embedded { "now embedded" } else { "no longer embedded" }.to_string());
    }
    if base.encoding != compare.encoding {
        changes.push(format!(
            "encoding {} -> {}",
            base.encoding.as_deref().unwrap_or("none"),
            compare.encoding.as_deref().unwrap_or("none")
        ));
    }
    if changes.is_empty() {
        return None;
    }
    Some(DifferenceDraft::new(
        DifferenceDetail::Font {
            font_name: compare.font_name.clone(),
        },
        ChangeType::Modified,
        severity(DifferenceType::Font, EMBEDDING_CHANGE),
        format!("Font {} changed: {}", compare.font_name, changes.join(", ")),
    ))
}
