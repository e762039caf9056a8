// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering with graceful degradation: standard DPI, then half DPI, then
// monochrome, and finally a blank bitmap sized to the declared page.

use docdelta_analysis::image::blank_rgb;
use docdelta_core::PageGeometry;
use image::{DynamicImage, RgbImage};
use tracing::{debug, instrument, warn};

use crate::extraction::{DocumentInfo, ExtractionService, Outcome, RenderSettings};

/// Which rung of the fallback chain produced a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenderQuality {
    Standard,
    Reduced,
    Monochrome,
    /// Nothing could be rendered; the bitmap is blank.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub image: RgbImage,
    pub quality: RenderQuality,
    /// Why the preferred render was not used, if it wasn't.
    pub degraded_reason: Option<String>,
}

impl RenderedPage {
    pub fn is_placeholder(&self) -> bool {
        self.quality == RenderQuality::Placeholder
    }

    /// The render as a `DynamicImage`, or `None` for placeholders, which
    /// carry no information about the page.
    pub fn content(&self) -> Option<DynamicImage> {
        (!self.is_placeholder()).then(|| DynamicImage::ImageRgb8(self.image.clone()))
    }
}

/// Blank bitmap the size `geometry` would render at `dpi`.
pub fn placeholder_bitmap(geometry: &PageGeometry, dpi: u32) -> RgbImage {
    let (width, height) = RenderSettings::color(dpi).pixel_size(&geometry.or_letter());
    blank_rgb(width, height)
}

/// Render a page, walking down the fallback chain until a rung succeeds.
/// Never fails: the last rung is a placeholder bitmap.
#[instrument(skip(service, document, geometry), fields(document = %document.document_id, page = page_index, dpi = dpi))]
pub fn render_with_fallback(
    service: &dyn ExtractionService,
    document: &DocumentInfo,
    page_index: u32,
    geometry: &PageGeometry,
    dpi: u32,
) -> RenderedPage {
    let reduced = (dpi / 2).max(1);
    let chain = [
        (RenderQuality::Standard, RenderSettings::color(dpi)),
        (RenderQuality::Reduced, RenderSettings::color(reduced)),
        (RenderQuality::Monochrome, RenderSettings::monochrome(reduced)),
    ];

    let mut first_failure: Option<String> = None;
    for (quality, settings) in chain {
        match service.render_page(document, page_index, settings) {
            Outcome::Ok(image) if image.width() > 0 && image.height() > 0 => {
                if quality != RenderQuality::Standard {
                    debug!(?quality, "render succeeded after fallback");
                }
                return RenderedPage {
                    image,
                    quality,
                    degraded_reason: first_failure,
                };
            }
            Outcome::Ok(_) => {
                debug!(?quality, "renderer returned an empty bitmap");
                first_failure = first_failure.or_else(|| Some("empty bitmap".to_string()));
            }
            Outcome::Degraded(reason) => {
                debug!(?quality, %reason, "render failed");
                first_failure = first_failure.or(Some(reason));
            }
        }
    }

    warn!("all render attempts failed, using a blank placeholder");
    RenderedPage {
        image: placeholder_bitmap(geometry, dpi),
        quality: RenderQuality::Placeholder,
        degraded_reason: first_failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExtractor, RenderBehaviour, text_page};

    fn render(behaviour: RenderBehaviour) -> RenderedPage {
        let fake = FakeExtractor::new()
            .with_document("doc", vec![text_page(&["Hello"])])
            .with_render_behaviour(behaviour);
        let info = DocumentInfo::new("doc", 1);
        render_with_fallback(&fake, &info, 0, &PageGeometry::LETTER, 72)
    }

    #[test]
    fn standard_render_is_used_when_it_works() {
        let page = render(RenderBehaviour::Normal);
        assert_eq!(page.quality, RenderQuality::Standard);
        assert_eq!(page.image.dimensions(), (612, 792));
        assert!(page.degraded_reason.is_none());
    }

    #[test]
    fn high_dpi_failure_falls_back_to_half_resolution() {
        let page = render(RenderBehaviour::FailAboveDpi(40));
        assert_eq!(page.quality, RenderQuality::Reduced);
        assert_eq!(page.image.dimensions(), (306, 396));
        assert!(page.degraded_reason.is_some());
    }

    #[test]
    fn colour_failure_falls_back_to_monochrome() {
        let page = render(RenderBehaviour::ColorFails);
        assert_eq!(page.quality, RenderQuality::Monochrome);
        assert!(page.content().is_some());
    }

    #[test]
    fn total_failure_yields_blank_page_sized_placeholder() {
        let page = render(RenderBehaviour::AlwaysFails);
        assert!(page.is_placeholder());
        assert_eq!(page.image.dimensions(), (612, 792));
        assert!(page.image.pixels().all(|p| p.0 == [255, 255, 255]));
        assert!(page.content().is_none());
    }
}
