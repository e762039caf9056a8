// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for a whole comparison run against a synthetic
// extraction service, with and without a warm analysis cache.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};

use docdelta_core::{
    CompareError, ComparisonId, DocumentRef, EmbeddedImage, EngineConfig, PageFont, PageGeometry, Rect, Result,
    TextRun,
};
use docdelta_engine::{AnalysisCache, DocumentInfo, ExtractionService, MemorySink, Orchestrator, Outcome, RenderSettings};

// ---------------------------------------------------------------------------
// Synthetic documents
// ---------------------------------------------------------------------------

/// Every page has a few paragraphs of text; the "revised" document edits one
/// word on every fifth page.
struct Synthetic {
    pages: u32,
}

impl Synthetic {
    fn lines(&self, document: &DocumentInfo, page: u32) -> Vec<String> {
        (0..12)
            .map(|line| {
                let edited = document.document_id == "revised" && page % 5 == 0 && line == 3;
                let word = if edited { "amended" } else { "original" };
                format!("page{page} line{line} carries {word} clause{line} text{page}")
            })
            .collect()
    }
}

impl ExtractionService for Synthetic {
    fn open(&self, document: &DocumentRef) -> Result<DocumentInfo> {
        match document.id.as_str() {
            "draft" | "revised" => Ok(DocumentInfo::new(document.id.clone(), self.pages)),
            _ => Err(CompareError::DocumentLoad(document.name.clone())),
        }
    }

    fn page_geometry(&self, _: &DocumentInfo, _: u32) -> Outcome<PageGeometry> {
        Outcome::Ok(PageGeometry::LETTER)
    }

    fn text_runs(&self, document: &DocumentInfo, page: u32) -> Outcome<Vec<TextRun>> {
        Outcome::Ok(
            self.lines(document, page)
                .into_iter()
                .enumerate()
                .map(|(i, line)| {
                    let width = 5.5 * line.len() as f64;
                    TextRun::new(line)
                        .with_rect(Rect::new(72.0, 720.0 - 16.0 * i as f64, width, 11.0))
                        .with_font("ABCDEF+Times-Roman", 11.0)
                })
                .collect(),
        )
    }

    fn images(&self, _: &DocumentInfo, _: u32) -> Outcome<Vec<EmbeddedImage>> {
        Outcome::Ok(Vec::new())
    }

    fn fonts(&self, _: &DocumentInfo, _: u32) -> Outcome<Vec<PageFont>> {
        Outcome::Ok(vec![PageFont::new("ABCDEF+Times-Roman", true)])
    }

    fn render_page(&self, _: &DocumentInfo, page: u32, settings: RenderSettings) -> Outcome<RgbImage> {
        let (width, height) = settings.pixel_size(&PageGeometry::LETTER);
        Outcome::Ok(RgbImage::from_fn(width, height, |x, y| {
            if (y / 6 + page) % 3 == 0 && x > width / 8 && x < width * 7 / 8 {
                Rgb([30, 30, 30])
            } else {
                Rgb([255, 255, 255])
            }
        }))
    }
}

fn orchestrator(pages: u32) -> Orchestrator {
    let config = EngineConfig {
        fingerprint_dpi: 18,
        ..EngineConfig::default()
    };
    Orchestrator::new(Arc::new(Synthetic { pages }), Arc::new(MemorySink::new()), config)
}

fn refs() -> (DocumentRef, DocumentRef) {
    (
        DocumentRef::new("draft", "draft.pdf", "synthetic://draft"),
        DocumentRef::new("revised", "revised.pdf", "synthetic://revised"),
    )
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_compare(c: &mut Criterion) {
    let (base, compare) = refs();

    c.bench_function("compare_documents cold cache (20 pages)", |b| {
        b.iter(|| {
            let engine = orchestrator(20);
            black_box(engine.compare_documents(base.clone(), compare.clone(), ComparisonId::new()))
        });
    });

    let warm = orchestrator(20).with_cache(Arc::new(AnalysisCache::new()));
    let _ = warm.compare_documents(base.clone(), compare.clone(), ComparisonId::new());
    c.bench_function("compare_documents warm cache (20 pages)", |b| {
        b.iter(|| black_box(warm.compare_documents(base.clone(), compare.clone(), ComparisonId::new())));
    });
}

criterion_group!(benches, bench_compare);
criterion_main!(benches);
