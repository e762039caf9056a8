// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Style comparison of text runs whose content is unchanged.

use docdelta_core::{ChangeType, DifferenceType, TextRun, severity};
use tracing::{debug, instrument};

use crate::difference::{DifferenceDetail, DifferenceDraft};
use crate::font::font_family;

/// Font size change (points) below which sizes count as equal.
pub const SIZE_TOLERANCE: f64 = 0.5;

/// Normalized colour distance below which colours count as equal.
pub const COLOR_TOLERANCE: f64 = 0.05;

const FACE_CHANGE: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct StyleDiffer;

impl StyleDiffer {
    pub fn new() -> Self {
        Self
    }

    /// Pair runs carrying the same text and report size, colour and typeface
    /// changes whose magnitude exceeds `threshold`.
    #[instrument(skip_all, fields(base = base.len(), compare = compare.len()))]
    pub fn diff(&self, base: &[TextRun], compare: &[TextRun], threshold: f64) -> Vec<DifferenceDraft> {
        let mut compare_used = vec![false; compare.len()];
        let mut drafts = Vec::new();

        for run in base {
            let text = run.text.trim();
            if text.is_empty() {
                continue;
            }
            let Some(ci) = (0..compare.len()).find(|&ci| !compare_used[ci] && compare[ci].text.trim() == text)
            else {
                continue;
            };
            compare_used[ci] = true;

            if let Some(draft) = compare_runs(run, &compare[ci], threshold) {
                drafts.push(draft);
            }
        }
        debug!(count = drafts.len(), "style differences");
        drafts
    }
}

fn compare_runs(base: &TextRun, compare: &TextRun, threshold: f64) -> Option<DifferenceDraft> {
    let mut changes = Vec::new();
    let mut magnitude: f64 = 0.0;

    let size_delta = (base.font_size - compare.font_size).abs();
    if size_delta > SIZE_TOLERANCE {
        let largest = base.font_size.abs().max(compare.font_size.abs()).max(f64::EPSILON);
        magnitude = magnitude.max((size_delta / largest).clamp(0.0, 1.0));
        changes.push(format!("size {:.1}pt -> {:.1}pt", base.font_size, compare.font_size));
    }

    let distance = base.fill_color.distance(&compare.fill_color);
    if distance > COLOR_TOLERANCE {
        magnitude = magnitude.max(distance);
        changes.push("colour changed".to_string());
    }

    if font_family(&base.font_name) != font_family(&compare.font_name) {
        magnitude = magnitude.max(FACE_CHANGE);
        changes.push(format!("font {} -> {}", base.font_name, compare.font_name));
    }

    if changes.is_empty() || magnitude <= threshold {
        return None;
    }

    let text = compare.text.trim().to_string();
    let description = format!("Style of \"{}\" changed: {}", excerpt(&text), changes.join(", "));
    Some(DifferenceDraft::new(
        DifferenceDetail::Style {
            text,
            base_rect: base.rect,
            compare_rect: compare.rect,
        },
        ChangeType::Modified,
        severity(DifferenceType::Style, magnitude),
        description,
    ))
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 40;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdelta_core::{Color, Rect, Severity};

    fn run(text: &str) -> TextRun {
        TextRun::new(text)
            .with_font("Helvetica", 12.0)
            .with_rect(Rect::new(72.0, 700.0, 100.0, 12.0))
    }

    #[test]
    fn unchanged_runs_produce_nothing() {
        let runs = vec![run("Title"), run("Body")];
        assert!(StyleDiffer::new().diff(&runs, &runs, 0.05).is_empty());
    }

    #[test]
    fn resized_run_is_reported() {
        let base = vec![run("Title")];
        let compare = vec![run("Title").with_font("Helvetica", 18.0)];
        let drafts = StyleDiffer::new().diff(&base, &compare, 0.05);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].change_type, ChangeType::Modified);
        assert!(drafts[0].description.contains("12.0pt -> 18.0pt"));
        assert_eq!(drafts[0].severity, Severity::Minor);
    }

    #[test]
    fn recoloured_run_is_reported() {
        let base = vec![run("Warning")];
        let compare = vec![run("Warning").with_color(Color::new(1.0, 0.0, 0.0))];
        let drafts = StyleDiffer::new().diff(&base, &compare, 0.05);
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].description.contains("colour"));
    }

    #[test]
    fn subset_prefixes_are_not_typeface_changes() {
        let base = vec![run("x").with_font("ABCDEF+Helvetica", 12.0)];
        let compare = vec![run("x").with_font("GHIJKL+Helvetica", 12.0)];
        assert!(StyleDiffer::new().diff(&base, &compare, 0.05).is_empty());
    }

    #[test]
    fn threshold_filters_small_changes() {
        let base = vec![run("Body")];
        let compare = vec![run("Body").with_font("Helvetica", 13.0)];
        assert!(StyleDiffer::new().diff(&base, &compare, 0.1).is_empty());
        assert_eq!(StyleDiffer::new().diff(&base, &compare, 0.05).len(), 1);
    }
}
