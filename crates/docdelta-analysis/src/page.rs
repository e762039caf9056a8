// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page differencing: runs every differ over one aligned page pair and
// files the normalized results into `PageDetails`.

use docdelta_core::{
    ChangeType, ComparisonOptions, EngineConfig, FontInfo, PageDetails, PageGeometry, TextRun,
};
use image::DynamicImage;
use tracing::{debug, instrument};

use crate::coordinates::{PagePlacement, normalize};
use crate::difference::{DifferenceDetail, DifferenceDraft, PageFrames};
use crate::font::FontDiffer;
use crate::image::{ImageDiffer, SignedImage, compare_page_images, compare_page_renders};
use crate::layout::TextLayout;
use crate::metadata::{diff_geometry, page_presence};
use crate::style::StyleDiffer;
use crate::text::TextDiffer;

/// Everything extracted for one side of a page pair.
#[derive(Debug, Clone, Copy)]
pub struct PageContent<'a> {
    /// 1-based page number within its own document.
    pub page_number: u32,
    pub geometry: PageGeometry,
    pub runs: &'a [TextRun],
    pub images: &'a [SignedImage<'a>],
    pub fonts: &'a [FontInfo],
    /// Full-resolution render, supplied only for pages without text.
    pub render: Option<&'a DynamicImage>,
}

/// Runs the text, image, font, style and metadata differs over page pairs.
#[derive(Debug, Clone)]
pub struct PageComparator {
    text: TextDiffer,
    image: ImageDiffer,
    font: FontDiffer,
    style: StyleDiffer,
    threshold: f64,
}

impl PageComparator {
    pub fn new(options: &ComparisonOptions, config: &EngineConfig) -> Self {
        Self {
            text: TextDiffer::new(options.text_method),
            image: ImageDiffer::new(),
            font: FontDiffer::new(),
            style: StyleDiffer::new(),
            threshold: options.threshold(config),
        }
    }

    /// Difference two paired pages. `position` is the 1-based index of the
    /// page in the aligned sequence.
    #[instrument(skip_all, fields(position = position, base = base.page_number, compare = compare.page_number))]
    pub fn compare(&self, position: u32, base: &PageContent<'_>, compare: &PageContent<'_>) -> PageDetails {
        let mut drafts = self.text_drafts(base.runs, compare.runs);
        drafts.extend(compare_page_images(base.images, compare.images, &self.image, self.threshold));
        if let (Some(a), Some(b)) = (base.render, compare.render) {
            drafts.extend(compare_page_renders(
                a,
                b,
                &base.geometry,
                &compare.geometry,
                &self.image,
                self.threshold,
            ));
        }
        drafts.extend(self.font.diff(base.fonts, compare.fonts).reported());
        drafts.extend(self.style.diff(base.runs, compare.runs, self.threshold));
        drafts.extend(diff_geometry(&base.geometry, &compare.geometry));

        let placement = PagePlacement {
            base_page_number: Some(base.page_number),
            compare_page_number: Some(compare.page_number),
            frames: PageFrames {
                base: base.geometry,
                compare: compare.geometry,
            },
        };
        let mut details = PageDetails::new(position, Some(base.page_number), Some(compare.page_number));
        details.base_dimensions = Some(base.geometry);
        details.compare_dimensions = Some(compare.geometry);
        file(&mut details, drafts, &placement);
        debug!(differences = details.difference_count(), "page compared");
        details
    }

    /// A page that exists on one side only gets a single page-level
    /// difference: `deleted` for base-only pages, `added` for compare-only.
    pub fn one_sided(&self, position: u32, page_number: u32, geometry: PageGeometry, change: ChangeType) -> PageDetails {
        let (base_page, compare_page) = match change {
            ChangeType::Deleted => (Some(page_number), None),
            _ => (None, Some(page_number)),
        };
        let placement = PagePlacement {
            base_page_number: base_page,
            compare_page_number: compare_page,
            frames: PageFrames {
                base: geometry,
                compare: geometry,
            },
        };
        let mut details = PageDetails::new(position, base_page, compare_page);
        if base_page.is_some() {
            details.base_dimensions = Some(geometry);
        } else {
            details.compare_dimensions = Some(geometry);
        }
        file(&mut details, vec![page_presence(change, page_number)], &placement);
        details
    }

    fn text_drafts(&self, base: &[TextRun], compare: &[TextRun]) -> Vec<DifferenceDraft> {
        let base_layout = TextLayout::new(base);
        let compare_layout = TextLayout::new(compare);
        let differences = self
            .text
            .diff(Some(base_layout.text()), Some(compare_layout.text()));
        let Some(first) = differences.first() else {
            return Vec::new();
        };

        let method = first.method;
        let base_spans = base_layout.token_spans(method);
        let compare_spans = compare_layout.token_spans(method);
        differences
            .into_iter()
            .map(|difference| {
                let description = difference.describe();
                let non_empty = |text: String| (!text.is_empty()).then_some(text);
                DifferenceDraft::new(
                    DifferenceDetail::Text {
                        base_rect: base_layout.rect_for(difference.base_range.clone(), &base_spans),
                        compare_rect: compare_layout.rect_for(difference.compare_range.clone(), &compare_spans),
                        base_text: non_empty(difference.base_text),
                        compare_text: non_empty(difference.compare_text),
                    },
                    difference.change_type,
                    difference.severity,
                    description,
                )
            })
            .collect()
    }
}

fn file(details: &mut PageDetails, drafts: Vec<DifferenceDraft>, placement: &PagePlacement) {
    for (index, draft) in drafts.into_iter().enumerate() {
        let id = format!(
            "p{}-{}-{}",
            details.page_number,
            draft.difference_type().as_str(),
            index + 1
        );
        details.push(normalize(draft, id, placement));
    }
}
