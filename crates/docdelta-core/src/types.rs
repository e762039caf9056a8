// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for docdelta comparisons and their results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CompareError, Result};

/// Unique identifier for a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonId(pub Uuid);

impl ComparisonId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ComparisonId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ComparisonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a document handed to the extraction service.
///
/// `id` keys the analysis caches, so two references with the same id are
/// assumed to point at the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
    /// Opaque locator understood by the extraction service (path, URL, key).
    pub location: String,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
        }
    }
}

/// Lifecycle states of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonStatus {
    /// Created, waiting to be picked up.
    Pending,
    /// Both documents are being opened.
    Processing,
    /// Per-page text and renders are being extracted and fingerprinted.
    ProcessingDocuments,
    /// Pages are being aligned.
    DocumentMatching,
    /// Page pairs are being differenced.
    Comparing,
    /// Result assembled and stored.
    Completed,
    /// A fatal error stopped the comparison; see the status message.
    Failed,
}

impl ComparisonStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ComparisonStatus) -> bool {
        use ComparisonStatus::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Processing)
            | (Processing, ProcessingDocuments)
            | (ProcessingDocuments, DocumentMatching)
            | (DocumentMatching, Comparing)
            | (Comparing, Completed) => true,
            _ => false,
        }
    }
}

/// A comparison request and its progress.
///
/// Created PENDING at request time and mutated only by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub id: ComparisonId,
    pub base_document: DocumentRef,
    pub compare_document: DocumentRef,
    pub status: ComparisonStatus,
    pub options: BTreeMap<String, String>,
    pub completed_operations: u32,
    pub total_operations: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status_message: Option<String>,
    /// Non-fatal problem (timeout, placeholders) the caller should know about.
    pub processing_warning: Option<String>,
    /// Where the result sink stored the serialized result, if anywhere.
    pub result_location: Option<String>,
}

impl Comparison {
    pub fn new(
        base_document: DocumentRef,
        compare_document: DocumentRef,
        options: BTreeMap<String, String>,
    ) -> Self {
        Self::with_id(ComparisonId::new(), base_document, compare_document, options)
    }

    pub fn with_id(
        id: ComparisonId,
        base_document: DocumentRef,
        compare_document: DocumentRef,
        options: BTreeMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            base_document,
            compare_document,
            status: ComparisonStatus::Pending,
            options,
            completed_operations: 0,
            total_operations: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            status_message: None,
            processing_warning: None,
            result_location: None,
        }
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn transition(&mut self, next: ComparisonStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CompareError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Fraction of page operations finished, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }
        self.completed_operations as f64 / self.total_operations as f64
    }
}

/// Modality a difference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceType {
    Text,
    Image,
    Font,
    Style,
    Metadata,
}

impl DifferenceType {
    pub const ALL: [DifferenceType; 5] = [
        Self::Text,
        Self::Image,
        Self::Font,
        Self::Style,
        Self::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Font => "font",
            Self::Style => "style",
            Self::Metadata => "metadata",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "font" => Some(Self::Font),
            "style" => Some(Self::Style),
            "metadata" => Some(Self::Metadata),
            _ => None,
        }
    }
}

/// What happened to the content between base and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Present only in the compare document.
    Added,
    /// Present only in the base document.
    Deleted,
    /// Present in both, but different.
    Modified,
}

/// How much a difference matters. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

/// Axis-aligned rectangle. Units are PDF points; the origin depends on the
/// coordinate space the value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Finite and with strictly positive extent.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            left: self.x,
            top: self.y,
            right: self.x + self.width,
            bottom: self.y + self.height,
        }
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Rect::new(left, top, right - left, bottom - top)
    }
}

/// Edges of a display-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Declared page size in PDF points plus the page's /Rotate value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: i32,
}

impl PageGeometry {
    /// US Letter, used whenever a page's size could not be read.
    pub const LETTER: PageGeometry = PageGeometry {
        width: 612.0,
        height: 792.0,
        rotation: 0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            rotation: 0,
        }
    }

    /// The geometry if usable, otherwise US Letter.
    pub fn or_letter(self) -> Self {
        if self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0 {
            self
        } else {
            Self::LETTER
        }
    }
}

/// A single reported difference between the two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    pub id: String,
    #[serde(rename = "type")]
    pub difference_type: DifferenceType,
    pub change_type: ChangeType,
    pub severity: Severity,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base_coordinates: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub compare_coordinates: Option<Rect>,
    pub base_page_number: Option<u32>,
    pub compare_page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub compare_text: Option<String>,
}

impl Difference {
    /// Display-space position as a rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Set position and derived bounds together so they never disagree.
    pub fn set_rect(&mut self, rect: Rect) {
        let bounds = rect.bounds();
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
        self.left = bounds.left;
        self.top = bounds.top;
        self.right = bounds.right;
        self.bottom = bounds.bottom;
    }

    /// Position is valid and bounds agree with it.
    pub fn has_valid_geometry(&self) -> bool {
        let rect = self.rect();
        if !rect.is_valid() {
            return false;
        }
        let bounds = rect.bounds();
        [
            (bounds.left, self.left),
            (bounds.top, self.top),
            (bounds.right, self.right),
            (bounds.bottom, self.bottom),
        ]
        .iter()
        .all(|(expected, actual)| actual.is_finite() && (expected - actual).abs() < 1e-6)
    }
}

/// Inclusive, 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }
}

/// One aligned page. A side is `None` when the page exists only on the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMapping {
    pub base_page_number: Option<u32>,
    pub compare_page_number: Option<u32>,
    pub similarity_score: f64,
    pub difference_count: u32,
}

impl PageMapping {
    pub fn is_paired(&self) -> bool {
        self.base_page_number.is_some() && self.compare_page_number.is_some()
    }
}

/// One aligned (base-range, compare-range) segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPair {
    pub pair_index: u32,
    pub matched: bool,
    pub has_base_document: bool,
    pub has_compare_document: bool,
    pub base_range: Option<PageRange>,
    pub compare_range: Option<PageRange>,
    pub base_page_count: u32,
    pub compare_page_count: u32,
    pub similarity_score: f64,
    pub total_differences: u32,
    pub page_mappings: Vec<PageMapping>,
}

/// Per-type difference counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub text: u32,
    pub image: u32,
    pub font: u32,
    pub style: u32,
    pub metadata: u32,
}

impl TypeCounts {
    pub fn increment(&mut self, kind: DifferenceType) {
        match kind {
            DifferenceType::Text => self.text += 1,
            DifferenceType::Image => self.image += 1,
            DifferenceType::Font => self.font += 1,
            DifferenceType::Style => self.style += 1,
            DifferenceType::Metadata => self.metadata += 1,
        }
    }

    pub fn get(&self, kind: DifferenceType) -> u32 {
        match kind {
            DifferenceType::Text => self.text,
            DifferenceType::Image => self.image,
            DifferenceType::Font => self.font,
            DifferenceType::Style => self.style,
            DifferenceType::Metadata => self.metadata,
        }
    }

    pub fn total(&self) -> u32 {
        self.text + self.image + self.font + self.style + self.metadata
    }

    pub fn merge(&mut self, other: &TypeCounts) {
        self.text += other.text;
        self.image += other.image;
        self.font += other.font;
        self.style += other.style;
        self.metadata += other.metadata;
    }
}

/// Per-severity difference counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: u32,
    pub minor: u32,
    pub major: u32,
    pub critical: u32,
}

impl SeverityCounts {
    pub fn increment(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Minor => self.minor += 1,
            Severity::Major => self.major += 1,
            Severity::Critical => self.critical += 1,
        }
    }
}

/// How a page entry was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Fully differenced.
    Compared,
    /// Processing failed or timed out; content is a stand-in.
    Placeholder,
    /// Left out by sparse sampling.
    Skipped,
}

/// Per-page container of differences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDetails {
    /// 1-based position in the aligned page sequence.
    pub page_number: u32,
    pub base_page_number: Option<u32>,
    pub compare_page_number: Option<u32>,
    pub page_exists_in_base: bool,
    pub page_exists_in_compare: bool,
    pub base_differences: Vec<Difference>,
    pub compare_differences: Vec<Difference>,
    pub base_dimensions: Option<PageGeometry>,
    pub compare_dimensions: Option<PageGeometry>,
    pub counts_by_type: TypeCounts,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

impl PageDetails {
    pub fn new(page_number: u32, base_page_number: Option<u32>, compare_page_number: Option<u32>) -> Self {
        Self {
            page_number,
            base_page_number,
            compare_page_number,
            page_exists_in_base: base_page_number.is_some(),
            page_exists_in_compare: compare_page_number.is_some(),
            base_differences: Vec::new(),
            compare_differences: Vec::new(),
            base_dimensions: None,
            compare_dimensions: None,
            counts_by_type: TypeCounts::default(),
            status: PageStatus::Compared,
            note: None,
        }
    }

    /// File a difference under the side it belongs to: deletions under base,
    /// additions and modifications under compare.
    pub fn push(&mut self, difference: Difference) {
        self.counts_by_type.increment(difference.difference_type);
        match difference.change_type {
            ChangeType::Deleted => self.base_differences.push(difference),
            ChangeType::Added | ChangeType::Modified => self.compare_differences.push(difference),
        }
    }

    pub fn difference_count(&self) -> u32 {
        (self.base_differences.len() + self.compare_differences.len()) as u32
    }

    pub fn differences(&self) -> impl Iterator<Item = &Difference> {
        self.base_differences.iter().chain(self.compare_differences.iter())
    }

    pub fn differences_mut(&mut self) -> impl Iterator<Item = &mut Difference> {
        self.base_differences
            .iter_mut()
            .chain(self.compare_differences.iter_mut())
    }
}

/// A font resident on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontInfo {
    pub font_name: String,
    /// Normalized family name (subset prefix and style/version suffixes removed).
    pub font_family: String,
    pub embedded: bool,
    pub bold: bool,
    pub italic: bool,
    pub encoding: Option<String>,
    /// The extraction layer could not fully decode this font.
    pub damaged: bool,
}

/// Aggregate statistics over the whole comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub overall_similarity_score: f64,
    pub total_differences: u32,
    pub counts_by_type: TypeCounts,
    pub counts_by_severity: SeverityCounts,
    pub pages_compared: u32,
    pub placeholder_pages: u32,
    pub skipped_pages: u32,
}

/// The complete, serializable outcome of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub comparison_id: ComparisonId,
    pub document_pairs: Vec<DocumentPair>,
    pub page_details: Vec<PageDetails>,
    pub summary: Summary,
}

impl ComparisonResult {
    /// No differences anywhere and every aligned segment matched.
    pub fn are_documents_identical(&self) -> bool {
        self.summary.total_differences == 0 && self.document_pairs.iter().all(|pair| pair.matched)
    }

    pub fn page(&self, page_number: u32) -> Option<&PageDetails> {
        self.page_details
            .iter()
            .find(|page| page.page_number == page_number)
    }

    pub fn differences(&self) -> impl Iterator<Item = &Difference> {
        self.page_details.iter().flat_map(|page| page.differences())
    }
}
