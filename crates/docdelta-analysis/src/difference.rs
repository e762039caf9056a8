// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Draft differences: what the differs emit before coordinate normalization
// turns them into reported `Difference`s.

use docdelta_core::{ChangeType, DifferenceType, PageGeometry, Rect, Severity};

use crate::coordinates::pdf_to_display_rect;

/// Modality-specific payload of a draft difference. Rectangles are in PDF
/// space on their respective page.
#[derive(Debug, Clone, PartialEq)]
pub enum DifferenceDetail {
    Text {
        base_text: Option<String>,
        compare_text: Option<String>,
        base_rect: Option<Rect>,
        compare_rect: Option<Rect>,
    },
    Image {
        resource_id: String,
        score: f64,
        base_rect: Option<Rect>,
        compare_rect: Option<Rect>,
    },
    Font {
        font_name: String,
    },
    Style {
        text: String,
        base_rect: Option<Rect>,
        compare_rect: Option<Rect>,
    },
    Metadata {
        field: String,
    },
}

/// Page geometry of both sides, needed to flip Y into display space.
#[derive(Debug, Clone, Copy)]
pub struct PageFrames {
    pub base: PageGeometry,
    pub compare: PageGeometry,
}

/// Display-space rectangles a difference can report for each side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideRects {
    pub base: Option<Rect>,
    pub compare: Option<Rect>,
}

/// Capability every difference variant implements: report where it sits in
/// display space, if it knows.
pub trait DisplayCoordinates {
    fn difference_type(&self) -> DifferenceType;

    fn display_rects(&self, frames: &PageFrames) -> SideRects;
}

impl DisplayCoordinates for DifferenceDetail {
    fn difference_type(&self) -> DifferenceType {
        match self {
            DifferenceDetail::Text { .. } => DifferenceType::Text,
            DifferenceDetail::Image { .. } => DifferenceType::Image,
            DifferenceDetail::Font { .. } => DifferenceType::Font,
            DifferenceDetail::Style { .. } => DifferenceType::Style,
            DifferenceDetail::Metadata { .. } => DifferenceType::Metadata,
        }
    }

    fn display_rects(&self, frames: &PageFrames) -> SideRects {
        match self {
            DifferenceDetail::Text {
                base_rect,
                compare_rect,
                ..
            }
            | DifferenceDetail::Image {
                base_rect,
                compare_rect,
                ..
            }
            | DifferenceDetail::Style {
                base_rect,
                compare_rect,
                ..
            } => SideRects {
                base: base_rect.map(|r| pdf_to_display_rect(r, frames.base.height)),
                compare: compare_rect.map(|r| pdf_to_display_rect(r, frames.compare.height)),
            },
            // Fonts and page metadata have no position of their own.
            DifferenceDetail::Font { .. } | DifferenceDetail::Metadata { .. } => SideRects::default(),
        }
    }
}

/// A classified difference that has not been placed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceDraft {
    pub detail: DifferenceDetail,
    pub change_type: ChangeType,
    pub severity: Severity,
    pub description: String,
}

impl DifferenceDraft {
    pub fn new(
        detail: DifferenceDetail,
        change_type: ChangeType,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            detail,
            change_type,
            severity,
            description: description.into(),
        }
    }

    pub fn difference_type(&self) -> DifferenceType {
        self.detail.difference_type()
    }

    /// Text fragments carried into the reported difference.
    pub fn fragments(&self) -> (Option<String>, Option<String>) {
        match &self.detail {
            DifferenceDetail::Text {
                base_text,
                compare_text,
                ..
            } => (base_text.clone(), compare_text.clone()),
            DifferenceDetail::Style { text, .. } => (Some(text.clone()), Some(text.clone())),
            _ => (None, None),
        }
    }
}
