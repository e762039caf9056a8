// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The seam to the PDF extraction layer. The engine never parses PDF itself;
// it asks an `ExtractionService` for per-page artifacts and renders.

use docdelta_core::{CompareError, DocumentRef, EmbeddedImage, PageFont, PageGeometry, Result, TextRun};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Result of a per-page extraction call.
///
/// A page that cannot be read is not an error for the comparison as a whole;
/// the extractor reports it as `Degraded` with a reason and the engine
/// substitutes placeholder data.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded(String),
}

impl<T> Outcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Degraded(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Degraded(reason) => Outcome::Degraded(reason),
        }
    }

    /// Degraded outcomes become recoverable extraction errors.
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::Degraded(reason) => Err(CompareError::Extraction(reason)),
        }
    }
}

/// What the extractor knows about an opened document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    /// Cache key; normally the `DocumentRef` id.
    pub document_id: String,
    pub page_count: u32,
}

impl DocumentInfo {
    pub fn new(document_id: impl Into<String>, page_count: u32) -> Self {
        Self {
            document_id: document_id.into(),
            page_count,
        }
    }
}

/// How a page should be rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub dpi: u32,
    /// Render in grayscale, expanded back to RGB.
    pub monochrome: bool,
}

impl RenderSettings {
    pub fn color(dpi: u32) -> Self {
        Self {
            dpi: dpi.max(1),
            monochrome: false,
        }
    }

    pub fn monochrome(dpi: u32) -> Self {
        Self {
            dpi: dpi.max(1),
            monochrome: true,
        }
    }

    /// Pixel size of a page with `geometry` at this resolution.
    pub fn pixel_size(&self, geometry: &PageGeometry) -> (u32, u32) {
        let scale = self.dpi as f64 / 72.0;
        let px = |points: f64| ((points * scale).round() as u32).clamp(1, MAX_RENDER_EDGE);
        (px(geometry.width), px(geometry.height))
    }
}

/// Longest edge, in pixels, the engine will ever allocate for a render.
pub const MAX_RENDER_EDGE: u32 = 8_192;

/// Per-page access to a PDF. Page indices are 0-based.
///
/// Implementations must be safe to call from several worker threads at once.
pub trait ExtractionService: Send + Sync {
    /// Open a document. Failure here is fatal for the comparison.
    fn open(&self, document: &DocumentRef) -> Result<DocumentInfo>;

    fn page_geometry(&self, document: &DocumentInfo, page_index: u32) -> Outcome<PageGeometry>;

    fn text_runs(&self, document: &DocumentInfo, page_index: u32) -> Outcome<Vec<TextRun>>;

    fn images(&self, document: &DocumentInfo, page_index: u32) -> Outcome<Vec<EmbeddedImage>>;

    fn fonts(&self, document: &DocumentInfo, page_index: u32) -> Outcome<Vec<PageFont>>;

    fn render_page(&self, document: &DocumentInfo, page_index: u32, settings: RenderSettings) -> Outcome<RgbImage>;
}
