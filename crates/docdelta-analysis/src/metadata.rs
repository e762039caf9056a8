// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-level metadata differences: size, rotation and page presence.

use docdelta_core::{ChangeType, DifferenceType, PageGeometry, severity};

use crate::difference::{DifferenceDetail, DifferenceDraft};

/// Size change (points) below which page dimensions count as equal.
pub const SIZE_TOLERANCE: f64 = 1.0;

const ROTATION_CHANGE: f64 = 0.5;
const PAGE_PRESENCE: f64 = 0.8;

/// Compare the geometry of two paired pages.
pub fn diff_geometry(base: &PageGeometry, compare: &PageGeometry) -> Vec<DifferenceDraft> {
    let mut drafts = Vec::new();

    let dw = (base.width - compare.width).abs();
    let dh = (base.height - compare.height).abs();
    if dw > SIZE_TOLERANCE || dh > SIZE_TOLERANCE {
        let relative = |delta: f64, a: f64, b: f64| delta / a.abs().max(b.abs()).max(1.0);
        let magnitude = relative(dw, base.width, compare.width)
            .max(relative(dh, base.height, compare.height))
            .clamp(0.0, 1.0);
        drafts.push(DifferenceDraft::new(
            DifferenceDetail::Metadata {
                field: "pageSize".to_string(),
            },
            ChangeType::Modified,
            severity(DifferenceType::Metadata, magnitude),
            format!(
                "Page size changed from {:.0}x{:.0} to {:.0}x{:.0} pt",
                base.width, base.height, compare.width, compare.height
            ),
        ));
    }

    if base.rotation.rem_euclid(360) != compare.rotation.rem_euclid(360) {
        drafts.push(DifferenceDraft::new(
            DifferenceDetail::Metadata {
                field: "rotation".to_string(),
            },
            ChangeType::Modified,
            severity(DifferenceType::Metadata, ROTATION_CHANGE),
            format!(
                "Page rotation changed from {}° to {}°",
                base.rotation.rem_euclid(360),
                compare.rotation.rem_euclid(360)
            ),
        ));
    }

    drafts
}

/// The single page-level difference reported for a page that exists on one
/// side only.
pub fn page_presence(change: ChangeType, page_number: u32) -> DifferenceDraft {
    let description = match change {
        ChangeType::Deleted => format!("Page {page_number} was removed"),
        _ => format!("Page {page_number} was added"),
    };
    DifferenceDraft::new(
        DifferenceDetail::Metadata {
            field: "page".to_string(),
        },
        change,
        severity(DifferenceType::Metadata, PAGE_PRESENCE),
        description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdelta_core::Severity;

    #[test]
    fn equal_geometry_has_no_differences() {
        assert!(diff_geometry(&PageGeometry::LETTER, &PageGeometry::LETTER).is_empty());
        let nudged = PageGeometry::new(612.4, 791.8);
        assert!(diff_geometry(&PageGeometry::LETTER, &nudged).is_empty());
    }

    #[test]
    fn letter_to_a4_is_a_size_change() {
        let a4 = PageGeometry::new(595.0, 842.0);
        let drafts = diff_geometry(&PageGeometry::LETTER, &a4);
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].description.contains("612x792"));
    }

    #[test]
    fn rotation_is_compared_modulo_full_turn() {
        let mut rotated = PageGeometry::LETTER;
        rotated.rotation = 360;
        assert!(diff_geometry(&PageGeometry::LETTER, &rotated).is_empty());
        rotated.rotation = 90;
        assert_eq!(diff_geometry(&PageGeometry::LETTER, &rotated).len(), 1);
    }

    #[test]
    fn page_presence_is_major() {
        let draft = page_presence(ChangeType::Added, 6);
        assert_eq!(draft.severity, Severity::Major);
        assert_eq!(draft.difference_type(), DifferenceType::Metadata);
        assert_eq!(draft.description, "Page 6 was added");
    }
}
