// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page artifacts delivered by the PDF extraction service. All geometry
// here is in PDF space (origin bottom-left, Y up).

use serde::{Deserialize, Serialize};

use crate::types::Rect;

/// RGB fill colour with channels in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance normalized to [0, 1].
    pub fn distance(&self, other: &Color) -> f64 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        ((dr * dr + dg * dg + db * db).sqrt() / 3f64.sqrt()).clamp(0.0, 1.0)
    }
}

/// One run of text drawn with a single font and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// Bounding box in PDF space; `y` is the bottom edge.
    pub rect: Option<Rect>,
    pub font_name: String,
    pub font_size: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub fill_color: Color,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rect: None,
            font_name: String::new(),
            font_size: 12.0,
            rotation: 0.0,
            fill_color: Color::BLACK,
        }
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn with_font(mut self, name: impl Into<String>, size: f64) -> Self {
        self.font_name = name.into();
        self.font_size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.fill_color = color;
        self
    }
}

/// A raster image embedded in a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    /// Stable id within the page (e.g. the XObject name).
    pub resource_id: String,
    /// Encoded bytes (PNG, JPEG, ...).
    pub data: Vec<u8>,
    /// Placement on the page in PDF space.
    pub rect: Option<Rect>,
}

/// Whether the extraction layer could decode a font program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontDecodeStatus {
    Decoded,
    Undecodable,
}

/// A font as reported by the extraction layer, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFont {
    pub name: String,
    pub embedded: bool,
    pub encoding: Option<String>,
    pub status: FontDecodeStatus,
}

impl PageFont {
    pub fn new(name: impl Into<String>, embedded: bool) -> Self {
        Self {
            name: name.into(),
            embedded,
            encoding: None,
            status: FontDecodeStatus::Decoded,
        }
    }

    pub fn undecodable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedded: false,
            encoding: None,
            status: FontDecodeStatus::Undecodable,
        }
    }
}

/// Concatenate run texts into the page's reading-order text, one run per
/// line. Blank runs are dropped.
pub fn page_text(runs: &[TextRun]) -> String {
    let mut text = String::new();
    for run in runs {
        let fragment = run.text.trim();
        if fragment.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(fragment);
    }
    text
}
