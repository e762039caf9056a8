// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Coordinate normalization between PDF space (origin bottom-left, Y up) and
// display space (origin top-left, Y down), default placement for differences
// without geometry, and the coordinate repair pass.

use docdelta_core::{
    ChangeType, Difference, DifferenceType, PageDetails, PageGeometry, Point, Rect,
};
use tracing::{debug, warn};

use crate::difference::{DifferenceDraft, DisplayCoordinates, PageFrames};

/// Smallest extent given to a finite rectangle that came in with zero or
/// negative width/height.
const MIN_EXTENT: f64 = 1.0;

pub fn pdf_to_display_point(point: Point, page_height: f64) -> Point {
    Point {
        x: point.x,
        y: page_height - point.y,
    }
}

pub fn display_to_pdf_point(point: Point, page_height: f64) -> Point {
    Point {
        x: point.x,
        y: page_height - point.y,
    }
}

/// `rect.y` is the bottom edge in PDF space; the result's `y` is the top edge
/// in display space.
pub fn pdf_to_display_rect(rect: Rect, page_height: f64) -> Rect {
    Rect::new(rect.x, page_height - (rect.y + rect.height), rect.width, rect.height)
}

pub fn display_to_pdf_rect(rect: Rect, page_height: f64) -> Rect {
    Rect::new(rect.x, page_height - (rect.y + rect.height), rect.width, rect.height)
}

/// Fractions (x, y, width, height) of the page used when a difference
/// carries no usable position.
fn default_fractions(kind: DifferenceType) -> (f64, f64, f64, f64) {
    match kind {
        DifferenceType::Text | DifferenceType::Style => (0.1, 0.1, 0.8, 0.2),
        DifferenceType::Image => (0.2, 0.2, 0.6, 0.25),
        DifferenceType::Font => (0.1, 0.05, 0.8, 0.1),
        DifferenceType::Metadata => (0.0, 0.0, 1.0, 0.05),
    }
}

/// Display-space default placement for a difference of `kind`.
pub fn default_rect(kind: DifferenceType, page: &PageGeometry) -> Rect {
    let page = page.or_letter();
    let (fx, fy, fw, fh) = default_fractions(kind);
    Rect::new(
        page.width * fx,
        page.height * fy,
        page.width * fw,
        page.height * fh,
    )
}

/// Turn an optional candidate into a valid rectangle: keep it if valid, widen
/// it if it is finite but flat, otherwise fall back to the type default.
pub fn ensure_rect(candidate: Option<Rect>, kind: DifferenceType, page: &PageGeometry) -> Rect {
    match candidate {
        Some(rect) if rect.is_valid() => rect,
        Some(rect) if rect.x.is_finite() && rect.y.is_finite() && rect.width.is_finite() && rect.height.is_finite() => {
            Rect::new(
                rect.x,
                rect.y,
                rect.width.max(MIN_EXTENT),
                rect.height.max(MIN_EXTENT),
            )
        }
        _ => default_rect(kind, page),
    }
}

/// Where a difference lives: page numbers and geometry on each side.
#[derive(Debug, Clone, Copy)]
pub struct PagePlacement {
    pub base_page_number: Option<u32>,
    pub compare_page_number: Option<u32>,
    pub frames: PageFrames,
}

/// Place a draft in display space and produce the reported difference.
///
/// The compare side is primary unless the content was deleted.
pub fn normalize(draft: DifferenceDraft, id: String, placement: &PagePlacement) -> Difference {
    let kind = draft.difference_type();
    let sides = draft.detail.display_rects(&placement.frames);
    let (primary, page) = match draft.change_type {
        ChangeType::Deleted => (sides.base.or(sides.compare), &placement.frames.base),
        ChangeType::Added | ChangeType::Modified => {
            (sides.compare.or(sides.base), &placement.frames.compare)
        }
    };
    let rect = ensure_rect(primary, kind, page);
    let (base_text, compare_text) = draft.fragments();

    let mut difference = Difference {
        id,
        difference_type: kind,
        change_type: draft.change_type,
        severity: draft.severity,
        description: draft.description,
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        base_coordinates: sides.base.filter(Rect::is_valid),
        compare_coordinates: sides.compare.filter(Rect::is_valid),
        base_page_number: placement.base_page_number,
        compare_page_number: placement.compare_page_number,
        base_text,
        compare_text,
    };
    difference.set_rect(rect);
    difference
}

/// Repair any difference whose position or bounds are missing, non-finite
/// or inconsistent. Returns the number of differences repaired.
///
/// Must run after all page tasks have joined.
pub fn repair_coordinates(pages: &mut [PageDetails]) -> usize {
    let mut repaired = 0;
    for page in pages.iter_mut() {
        let base_geometry = page.base_dimensions.unwrap_or(PageGeometry::LETTER);
        let compare_geometry = page.compare_dimensions.unwrap_or(base_geometry);
        let page_number = page.page_number;
        for difference in page.differences_mut() {
            if difference.has_valid_geometry() {
                continue;
            }
            let geometry = match difference.change_type {
                ChangeType::Deleted => base_geometry,
                _ => compare_geometry,
            };
            let current = difference.rect();
            let candidate = if current.is_valid() {
                Some(current)
            } else {
                // Fall back to the bounds if those survived.
                let from_bounds = Rect::new(
                    difference.left,
                    difference.top,
                    difference.right - difference.left,
                    difference.bottom - difference.top,
                );
                from_bounds.is_valid().then_some(from_bounds)
            };
            let fixed = ensure_rect(candidate, difference.difference_type, &geometry);
            debug!(page_number, id = %difference.id, "repairing difference coordinates");
            difference.set_rect(fixed);
            repaired += 1;
        }
    }
    if repaired > 0 {
        warn!(repaired, "differences needed coordinate repair");
    }
    repaired
}
