// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Whole-page visual comparison for pages without extractable text, where the
// rendered bitmap is the only content there is to compare.

use docdelta_core::{ChangeType, DifferenceType, PageGeometry, Rect, severity};
use image::DynamicImage;

use super::differ::{ImageDiffer, PixelRegion};
use crate::difference::{DifferenceDetail, DifferenceDraft};

/// Resource id reported for whole-page render differences.
pub const PAGE_RESOURCE_ID: &str = "page";

/// Compare two page renders. Returns a modified image difference when the
/// score exceeds `threshold`, narrowed to the changed pixel region.
pub fn compare_page_renders(
    base: &DynamicImage,
    compare: &DynamicImage,
    base_geometry: &PageGeometry,
    compare_geometry: &PageGeometry,
    differ: &ImageDiffer,
    threshold: f64,
) -> Option<DifferenceDraft> {
    let score = differ.score(base, compare);
    if score <= threshold {
        return None;
    }
    let region = differ.difference_region(base, compare);
    let base_rect = region.map(|r| to_page(r, base, base_geometry));
    let compare_rect = if base.width() == compare.width() && base.height() == compare.height() {
        region.map(|r| to_page(r, compare, compare_geometry))
    } else {
        None
    };

    Some(DifferenceDraft::new(
        DifferenceDetail::Image {
            resource_id: PAGE_RESOURCE_ID.to_string(),
            score,
            base_rect,
            compare_rect,
        },
        ChangeType::Modified,
        severity(DifferenceType::Image, score),
        format!("Page appearance changed (difference {score:.2})"),
    ))
}

/// Pixel region of a render (origin top-left) to PDF space on its page.
fn to_page(region: PixelRegion, render: &DynamicImage, geometry: &PageGeometry) -> Rect {
    let sx = geometry.width / render.width().max(1) as f64;
    let sy = geometry.height / render.height().max(1) as f64;
    Rect::new(
        region.x as f64 * sx,
        geometry.height - (region.y + region.height) as f64 * sy,
        region.width as f64 * sx,
        region.height as f64 * sy,
    )
}
