// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory extraction service for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use docdelta_core::{
    CompareError, DocumentRef, EmbeddedImage, PageFont, PageGeometry, Rect, Result, TextRun,
};
use image::{Rgb, RgbImage};

use crate::extraction::{DocumentInfo, ExtractionService, Outcome, RenderSettings};

/// Route engine logs to the test harness; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub geometry: PageGeometry,
    pub runs: Vec<TextRun>,
    pub images: Vec<EmbeddedImage>,
    pub fonts: Vec<PageFont>,
    /// Dark boxes drawn into renders in addition to the text runs.
    pub marks: Vec<Rect>,
    /// `images()` sleeps this long before answering.
    pub image_delay: Option<Duration>,
}

impl FakePage {
    pub fn blank() -> Self {
        Self {
            geometry: PageGeometry::LETTER,
            runs: Vec::new(),
            images: Vec::new(),
            fonts: Vec::new(),
            marks: Vec::new(),
            image_delay: None,
        }
    }
}

/// A Letter page with one Helvetica 12pt run per line, 6pt per character.
pub fn text_page(lines: &[&str]) -> FakePage {
    let runs = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            TextRun::new(*line)
                .with_rect(Rect::new(72.0, 700.0 - 20.0 * i as f64, 6.0 * line.chars().count() as f64, 12.0))
                .with_font("Helvetica", 12.0)
        })
        .collect();
    FakePage {
        runs,
        fonts: vec![PageFont::new("Helvetica", true)],
        ..FakePage::blank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBehaviour {
    Normal,
    FailAboveDpi(u32),
    ColorFails,
    AlwaysFails,
}

#[derive(Debug)]
pub struct FakeExtractor {
    documents: HashMap<String, Vec<FakePage>>,
    unreadable: HashSet<String>,
    render: RenderBehaviour,
    /// Remaining degraded answers from `images`, per (document, page).
    flaky_images: Mutex<HashMap<(String, u32), u32>>,
    text_calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            unreadable: HashSet::new(),
            render: RenderBehaviour::Normal,
            flaky_images: Mutex::new(HashMap::new()),
            text_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_document(mut self, id: &str, pages: Vec<FakePage>) -> Self {
        self.documents.insert(id.to_string(), pages);
        self
    }

    pub fn with_unreadable(mut self, id: &str) -> Self {
        self.unreadable.insert(id.to_string());
        self
    }

    pub fn with_render_behaviour(mut self, behaviour: RenderBehaviour) -> Self {
        self.render = behaviour;
        self
    }

    /// `images` for the page answers `Degraded` the next `failures` times.
    pub fn with_flaky_images(self, id: &str, page_index: u32, failures: u32) -> Self {
        if let Ok(mut flaky) = self.flaky_images.lock() {
            flaky.insert((id.to_string(), page_index), failures);
        }
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    fn page(&self, document: &DocumentInfo, page_index: u32) -> Option<&FakePage> {
        self.documents
            .get(&document.document_id)
            .and_then(|pages| pages.get(page_index as usize))
    }
}

fn missing(page_index: u32) -> String {
    format!("page index {page_index} does not exist")
}

impl ExtractionService for FakeExtractor {
    fn open(&self, document: &DocumentRef) -> Result<DocumentInfo> {
        if self.unreadable.contains(&document.id) {
            return Err(CompareError::DocumentLoad(format!("{} is not a PDF", document.name)));
        }
        let pages = self
            .documents
            .get(&document.id)
            .ok_or_else(|| CompareError::DocumentLoad(format!("{} not found", document.name)))?;
        Ok(DocumentInfo::new(document.id.clone(), pages.len() as u32))
    }

    fn page_geometry(&self, document: &DocumentInfo, page_index: u32) -> Outcome<PageGeometry> {
        match self.page(document, page_index) {
            Some(page) => Outcome::Ok(page.geometry),
            None => Outcome::Degraded(missing(page_index)),
        }
    }

    fn text_runs(&self, document: &DocumentInfo, page_index: u32) -> Outcome<Vec<TextRun>> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        match self.page(document, page_index) {
            Some(page) => Outcome::Ok(page.runs.clone()),
            None => Outcome::Degraded(missing(page_index)),
        }
    }

    fn images(&self, document: &DocumentInfo, page_index: u32) -> Outcome<Vec<EmbeddedImage>> {
        if let Ok(mut flaky) = self.flaky_images.lock() {
            if let Some(remaining) = flaky.get_mut(&(document.document_id.clone(), page_index)) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Outcome::Degraded("image stream could not be decoded".into());
                }
            }
        }
        match self.page(document, page_index) {
            Some(page) => {
                if let Some(delay) = page.image_delay {
                    thread::sleep(delay);
                }
                Outcome::Ok(page.images.clone())
            }
            None => Outcome::Degraded(missing(page_index)),
        }
    }

    fn fonts(&self, document: &DocumentInfo, page_index: u32) -> Outcome<Vec<PageFont>> {
        match self.page(document, page_index) {
            Some(page) => Outcome::Ok(page.fonts.clone()),
            None => Outcome::Degraded(missing(page_index)),
        }
    }

    fn render_page(&self, document: &DocumentInfo, page_index: u32, settings: RenderSettings) -> Outcome<RgbImage> {
        let refused = match self.render {
            RenderBehaviour::Normal => false,
            RenderBehaviour::FailAboveDpi(limit) => settings.dpi > limit,
            RenderBehaviour::ColorFails => !settings.monochrome,
            RenderBehaviour::AlwaysFails => true,
        };
        if refused {
            return Outcome::Degraded(format!("renderer refused {} dpi", settings.dpi));
        }
        let Some(page) = self.page(document, page_index) else {
            return Outcome::Degraded(missing(page_index));
        };

        let (width, height) = settings.pixel_size(&page.geometry);
        let scale = settings.dpi as f64 / 72.0;
        let ink = if settings.monochrome { Rgb([0, 0, 0]) } else { Rgb([20, 20, 120]) };
        let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let boxes = page.runs.iter().filter_map(|run| run.rect).chain(page.marks.iter().copied());
        for rect in boxes {
            // PDF space has its origin bottom-left.
            let x0 = (rect.x * scale).max(0.0) as u32;
            let y0 = ((page.geometry.height - rect.y - rect.height) * scale).max(0.0) as u32;
            let x1 = (((rect.x + rect.width) * scale) as u32).min(width);
            let y1 = (((page.geometry.height - rect.y) * scale) as u32).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    image.put_pixel(x, y, ink);
                }
            }
        }
        Outcome::Ok(image)
    }
}
