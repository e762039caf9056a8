// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Comparison orchestrator: drives a `Comparison` through its lifecycle.
//
//   PROCESSING            open both documents (fatal on failure)
//   PROCESSING_DOCUMENTS  fingerprint every page on the worker pool
//   DOCUMENT_MATCHING     align the fingerprints once
//   COMPARING             one retried task per page mapping, under the
//                         aggregate deadline
//   COMPLETED             result assembled, coordinates repaired, stored
//
// Page-level problems never fail a comparison: they become placeholder
// pages and a processing warning. Only document-load and storage errors
// move it to FAILED.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use docdelta_analysis::{
    DocumentAligner, ImageSignature, PageComparator, PageContent, PageFingerprint, SignedImage, font_info,
    repair_coordinates,
};
use docdelta_core::artifacts::page_text;
use docdelta_core::{
    ChangeType, CompareError, Comparison, ComparisonId, ComparisonOptions, ComparisonResult, ComparisonStatus,
    DocumentPair, DocumentRef, EmbeddedImage, EngineConfig, FontInfo, PageDetails, PageGeometry, PageMapping,
    PageStatus, Result, SeverityCounts, Summary, TextRun, TypeCounts,
};
use image::DynamicImage;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{AnalysisCache, PageKey};
use crate::extraction::{DocumentInfo, ExtractionService, Outcome};
use crate::pool::{Progress, WorkerPool, pool_size};
use crate::render::render_with_fallback;
use crate::retry::RetryPolicy;
use crate::sampling::SamplingPlan;
use crate::sink::ResultSink;

/// Called with `(comparison, completed, total)` whenever a comparison's page
/// progress moves.
pub type ProgressListener = Arc<dyn Fn(&ComparisonId, u32, u32) + Send + Sync>;

/// Runs comparisons against one extraction service and result sink.
///
/// Each comparison gets a fresh analysis cache that is dropped when it
/// finishes. A cache injected with [`Orchestrator::with_cache`] is shared by
/// every comparison instead, so comparing the same documents again reuses
/// their extracted pages; its owner decides when to drop it.
pub struct Orchestrator {
    service: Arc<dyn ExtractionService>,
    sink: Arc<dyn ResultSink>,
    shared_cache: Option<Arc<AnalysisCache>>,
    listener: Option<ProgressListener>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn ExtractionService>, sink: Arc<dyn ResultSink>, config: EngineConfig) -> Self {
        Self {
            service,
            sink,
            shared_cache: None,
            listener: None,
            config,
        }
    }

    pub fn with_progress_listener(mut self, listener: ProgressListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Share `cache` across every comparison this orchestrator runs.
    pub fn with_cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.shared_cache = Some(cache);
        self
    }

    pub fn shared_cache(&self) -> Option<&Arc<AnalysisCache>> {
        self.shared_cache.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compare two documents with default options.
    pub fn compare_documents(
        &self,
        base: DocumentRef,
        compare: DocumentRef,
        comparison_id: ComparisonId,
    ) -> Result<ComparisonResult> {
        let mut comparison = Comparison::with_id(comparison_id, base, compare, BTreeMap::new());
        self.run(&mut comparison)
    }

    /// Run a PENDING comparison to COMPLETED, or to FAILED with a status
    /// message when a fatal error occurs.
    #[instrument(skip_all, fields(comparison = %comparison.id))]
    pub fn run(&self, comparison: &mut Comparison) -> Result<ComparisonResult> {
        match self.execute(comparison) {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(%err, status = ?comparison.status, "comparison failed");
                comparison.status_message = Some(err.to_string());
                if let Err(transition) = comparison.transition(ComparisonStatus::Failed) {
                    warn!(%transition, "could not mark comparison as failed");
                }
                Err(err)
            }
        }
    }

    fn execute(&self, comparison: &mut Comparison) -> Result<ComparisonResult> {
        let options = ComparisonOptions::from_map(&comparison.options);
        let policy = RetryPolicy::from_config(&self.config);

        comparison.transition(ComparisonStatus::Processing)?;
        let base = self.open(&comparison.base_document)?;
        let compare = self.open(&comparison.compare_document)?;
        info!(base_pages = base.page_count, compare_pages = compare.page_count, "documents opened");

        let cache = match &self.shared_cache {
            Some(shared) => Arc::clone(shared),
            None => Arc::new(AnalysisCache::new()),
        };
        let worker = Arc::new(PageWorker {
            service: Arc::clone(&self.service),
            cache,
            comparator: PageComparator::new(&options, &self.config),
            deadline: policy.deadline_from(Instant::now()),
            policy,
            render_dpi: self.config.render_dpi,
            fingerprint_dpi: self.config.fingerprint_dpi,
            base,
            compare,
            progress: Arc::new(Progress::default()),
        });
        let cancel = Arc::new(AtomicBool::new(false));
        let mut warnings = Vec::new();

        comparison.transition(ComparisonStatus::ProcessingDocuments)?;
        let (base_prints, compare_prints) = self.fingerprint_documents(&worker, &cancel, &mut warnings)?;

        comparison.transition(ComparisonStatus::DocumentMatching)?;
        let mut pairs = DocumentAligner::from_config(&self.config).align(
            &base_prints,
            &compare_prints,
            options.smart_matching,
        );
        info!(pairs = pairs.len(), "pages aligned");

        comparison.transition(ComparisonStatus::Comparing)?;
        let mappings: Vec<PageMapping> = pairs
            .iter()
            .flat_map(|pair| pair.page_mappings.iter().cloned())
            .collect();
        let page_count = worker.base.page_count.max(worker.compare.page_count);
        let plan = SamplingPlan::for_documents(mappings.len(), page_count, options.exhaustive, &self.config);
        comparison.total_operations = mappings.len() as u32;
        let mut pages = self.compare_pages(&worker, &cancel, &mappings, &plan, comparison, &mut warnings)?;

        let repaired = repair_coordinates(&mut pages);
        if repaired > 0 {
            debug!(repaired, "coordinates repaired");
        }
        fill_difference_counts(&mut pairs, &pages);
        let summary = summarize(&mappings, &pages);
        let result = ComparisonResult {
            comparison_id: comparison.id,
            document_pairs: pairs,
            page_details: pages,
            summary,
        };

        comparison.result_location = Some(self.sink.store(&result)?);
        comparison.completed_operations = comparison.total_operations;
        self.report(comparison);
        comparison.status_message = Some(status_message(&warnings, &plan));
        comparison.processing_warning = (!warnings.is_empty()).then(|| warnings.join("; "));
        comparison.transition(ComparisonStatus::Completed)?;
        info!(
            differences = result.summary.total_differences,
            similarity = result.summary.overall_similarity_score,
            "comparison completed"
        );
        Ok(result)
    }

    fn report(&self, comparison: &Comparison) {
        if let Some(listener) = &self.listener {
            listener(&comparison.id, comparison.completed_operations, comparison.total_operations);
        }
    }

    fn open(&self, document: &DocumentRef) -> Result<DocumentInfo> {
        self.service.open(document).map_err(|err| match err {
            CompareError::DocumentLoad(_) => err,
            other => CompareError::DocumentLoad(format!("{}: {other}", document.name)),
        })
    }

    #[instrument(skip_all)]
    fn fingerprint_documents(
        &self,
        worker: &Arc<PageWorker>,
        cancel: &Arc<AtomicBool>,
        warnings: &mut Vec<String>,
    ) -> Result<(Vec<PageFingerprint>, Vec<PageFingerprint>)> {
        let tasks: Vec<(Side, u32)> = (0..worker.base.page_count)
            .map(|index| (Side::Base, index))
            .chain((0..worker.compare.page_count).map(|index| (Side::Compare, index)))
            .collect();
        let pool = WorkerPool::new(pool_size(self.config.worker_threads, tasks.len()))?;
        let job = Arc::clone(worker);
        let outcome = pool.run_batch(
            tasks.clone(),
            worker.deadline,
            cancel,
            move |(side, index), _| job.fingerprint(side, index),
            |_, _| {},
        );

        let mut base = Vec::with_capacity(worker.base.page_count as usize);
        let mut compare = Vec::with_capacity(worker.compare.page_count as usize);
        let (mut degraded, mut missing) = (0, 0);
        for ((side, _), result) in tasks.into_iter().zip(outcome.results) {
            let fingerprint = match result {
                Some(Fingerprinted { fingerprint, degraded: reason }) => {
                    if reason.is_some() {
                        degraded += 1;
                    }
                    fingerprint
                }
                None => {
                    missing += 1;
                    PageFingerprint::from_parts("", None)
                }
            };
            match side {
                Side::Base => base.push(fingerprint),
                Side::Compare => compare.push(fingerprint),
            }
        }

        if degraded > 0 {
            warnings.push(format!("{degraded} page(s) could not be fully read and were aligned from partial data"));
        }
        if missing > 0 {
            warnings.push(format!(
                "{missing} page(s) were not fingerprinted before the {}s processing deadline",
                worker.policy.aggregate_deadline.as_secs()
            ));
        }
        Ok((base, compare))
    }

    #[instrument(skip_all, fields(mappings = mappings.len()))]
    fn compare_pages(
        &self,
        worker: &Arc<PageWorker>,
        cancel: &Arc<AtomicBool>,
        mappings: &[PageMapping],
        plan: &SamplingPlan,
        comparison: &mut Comparison,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<PageDetails>> {
        worker.progress.reset(mappings.len() as u32);
        let mut pages: Vec<Option<PageDetails>> = vec![None; mappings.len()];
        let mut slots = Vec::new();
        for (index, mapping) in mappings.iter().enumerate() {
            let position = index as u32 + 1;
            if plan.is_selected(index) {
                slots.push((index, position, mapping.clone()));
            } else {
                pages[index] = Some(worker.skipped(position, mapping));
                worker.progress.advance();
            }
        }
        if plan.is_sampled() {
            info!(selected = plan.selected_count(), total = mappings.len(), "sampling long document");
        }
        comparison.completed_operations = worker.progress.completed();
        self.report(comparison);

        let tasks: Vec<(u32, PageMapping)> = slots
            .iter()
            .map(|(_, position, mapping)| (*position, mapping.clone()))
            .collect();
        let pool = WorkerPool::new(pool_size(self.config.worker_threads, tasks.len()))?;
        let job = Arc::clone(worker);
        let progress = Arc::clone(&worker.progress);
        let outcome = pool.run_batch(
            tasks,
            worker.deadline,
            cancel,
            move |(position, mapping): (u32, PageMapping), cancel: &AtomicBool| {
                let result = job
                    .policy
                    .run(job.deadline, cancel, |attempt| job.compare_mapping(position, &mapping, attempt));
                job.progress.advance();
                result
            },
            |_, _| {
                comparison.completed_operations = progress.completed();
                self.report(comparison);
            },
        );

        let seconds = worker.policy.aggregate_deadline.as_secs();
        let (mut late, mut failed) = (0, 0);
        for ((index, position, mapping), result) in slots.into_iter().zip(outcome.results) {
            let details = match result {
                Some(Ok(details)) => details,
                Some(Err(err)) if err.is_fatal() => return Err(err),
                Some(Err(CompareError::Timeout { .. })) | None => {
                    late += 1;
                    worker.placeholder(
                        position,
                        &mapping,
                        format!("Page was not compared before the {seconds}s processing deadline"),
                    )
                }
                Some(Err(err)) => {
                    failed += 1;
                    warn!(position, %err, "page replaced by placeholder");
                    worker.placeholder(position, &mapping, format!("Page could not be compared: {err}"))
                }
            };
            pages[index] = Some(details);
        }

        if late > 0 {
            warnings.push(format!(
                "processing deadline of {seconds}s expired; {late} page(s) replaced by placeholders"
            ));
        }
        if failed > 0 {
            warnings.push(format!(
                "{failed} page(s) could not be compared after {} attempts and were replaced by placeholders",
                worker.policy.max_attempts
            ));
        }
        Ok(pages.into_iter().flatten().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Base,
    Compare,
}

struct Fingerprinted {
    fingerprint: PageFingerprint,
    degraded: Option<String>,
}

/// Everything extracted for one page, borrowed by `PageContent`.
struct LoadedPage {
    geometry: PageGeometry,
    runs: Arc<Vec<TextRun>>,
    fonts: Arc<Vec<FontInfo>>,
    images: Vec<EmbeddedImage>,
    signatures: Vec<Arc<ImageSignature>>,
}

impl LoadedPage {
    fn has_text(&self) -> bool {
        self.runs.iter().any(|run| !run.text.trim().is_empty())
    }

    fn signed(&self) -> Vec<SignedImage<'_>> {
        self.images
            .iter()
            .zip(&self.signatures)
            .map(|(image, signature)| SignedImage {
                image,
                signature: signature.as_ref(),
            })
            .collect()
    }
}

/// The per-comparison state page tasks need, shared with the worker pool.
struct PageWorker {
    service: Arc<dyn ExtractionService>,
    cache: Arc<AnalysisCache>,
    comparator: PageComparator,
    policy: RetryPolicy,
    deadline: Instant,
    render_dpi: u32,
    fingerprint_dpi: u32,
    base: DocumentInfo,
    compare: DocumentInfo,
    progress: Arc<Progress>,
}

impl PageWorker {
    fn document(&self, side: Side) -> &DocumentInfo {
        match side {
            Side::Base => &self.base,
            Side::Compare => &self.compare,
        }
    }

    fn key(&self, side: Side, index: u32) -> PageKey {
        PageKey::new(self.document(side).document_id.clone(), index)
    }

    fn geometry(&self, side: Side, index: u32) -> Outcome<PageGeometry> {
        let document = self.document(side);
        self.cache
            .geometry
            .get_or_try_insert_with(&self.key(side, index), || {
                self.service.page_geometry(document, index).map(PageGeometry::or_letter)
            })
            .map(|geometry| *geometry)
    }

    fn text_runs(&self, side: Side, index: u32) -> Outcome<Arc<Vec<TextRun>>> {
        let document = self.document(side);
        self.cache
            .text_runs
            .get_or_try_insert_with(&self.key(side, index), || self.service.text_runs(document, index))
    }

    /// Geometry already known from fingerprinting, without calling out to
    /// the extractor again.
    fn known_geometry(&self, side: Side, index: u32) -> Option<PageGeometry> {
        self.cache.geometry.get(&self.key(side, index)).map(|geometry| *geometry)
    }

    #[instrument(skip(self), fields(document = %self.document(side).document_id))]
    fn fingerprint(&self, side: Side, index: u32) -> Fingerprinted {
        let key = self.key(side, index);
        if let Some(cached) = self.cache.fingerprints.get(&key) {
            return Fingerprinted {
                fingerprint: (*cached).clone(),
                degraded: None,
            };
        }

        let mut degraded = None;
        let geometry = match self.geometry(side, index) {
            Outcome::Ok(geometry) => geometry,
            Outcome::Degraded(reason) => {
                degraded = Some(reason);
                PageGeometry::LETTER
            }
        };
        let text = match self.text_runs(side, index) {
            Outcome::Ok(runs) => page_text(&runs),
            Outcome::Degraded(reason) => {
                degraded = degraded.or(Some(reason));
                String::new()
            }
        };
        let render = render_with_fallback(
            self.service.as_ref(),
            self.document(side),
            index,
            &geometry,
            self.fingerprint_dpi,
        );
        if render.is_placeholder() {
            degraded = degraded.or_else(|| render.degraded_reason.clone());
        }

        let fingerprint = PageFingerprint::new(&text, render.content().as_ref());
        if degraded.is_none() {
            self.cache.fingerprints.insert(key, fingerprint.clone());
        } else {
            debug!(reason = ?degraded, "page fingerprinted from partial data");
        }
        Fingerprinted { fingerprint, degraded }
    }

    fn load(&self, side: Side, index: u32) -> Result<LoadedPage> {
        let document = self.document(side);
        let key = self.key(side, index);
        let geometry = self.geometry(side, index).into_result()?;
        let runs = self.text_runs(side, index).into_result()?;
        let fonts = self
            .cache
            .fonts
            .get_or_try_insert_with(&key, || {
                self.service
                    .fonts(document, index)
                    .map(|fonts| fonts.iter().map(font_info).collect())
            })
            .into_result()?;
        let images = self.service.images(document, index).into_result()?;
        let signatures = images
            .iter()
            .map(|image| {
                let resource = key.resource(image.resource_id.clone());
                match self.cache.image_signatures.get(&resource) {
                    Some(signature) => signature,
                    None => self.cache.image_signatures.insert(resource, ImageSignature::compute(image)),
                }
            })
            .collect();
        Ok(LoadedPage {
            geometry,
            runs,
            fonts,
            images,
            signatures,
        })
    }

    /// Full-resolution render, or `None` if only a placeholder was possible.
    fn full_render(&self, side: Side, index: u32, geometry: &PageGeometry) -> Option<DynamicImage> {
        render_with_fallback(self.service.as_ref(), self.document(side), index, geometry, self.render_dpi).content()
    }

    #[instrument(skip(self, mapping), fields(base = ?mapping.base_page_number, compare = ?mapping.compare_page_number))]
    fn compare_mapping(&self, position: u32, mapping: &PageMapping, attempt: u32) -> Result<PageDetails> {
        if attempt > 1 {
            debug!(attempt, "retrying page");
        }
        match (mapping.base_page_number, mapping.compare_page_number) {
            (Some(base_number), Some(compare_number)) => {
                let (base_index, compare_index) = (base_number - 1, compare_number - 1);
                let base = self.load(Side::Base, base_index)?;
                let compare = self.load(Side::Compare, compare_index)?;

                // Without text on either side the render is all there is.
                let (base_render, compare_render) = if base.has_text() || compare.has_text() {
                    (None, None)
                } else {
                    (
                        self.full_render(Side::Base, base_index, &base.geometry),
                        self.full_render(Side::Compare, compare_index, &compare.geometry),
                    )
                };

                let base_images = base.signed();
                let compare_images = compare.signed();
                let base_content = PageContent {
                    page_number: base_number,
                    geometry: base.geometry,
                    runs: &base.runs,
                    images: &base_images,
                    fonts: &base.fonts,
                    render: base_render.as_ref(),
                };
                let compare_content = PageContent {
                    page_number: compare_number,
                    geometry: compare.geometry,
                    runs: &compare.runs,
                    images: &compare_images,
                    fonts: &compare.fonts,
                    render: compare_render.as_ref(),
                };
                Ok(self.comparator.compare(position, &base_content, &compare_content))
            }
            (Some(base_number), None) => {
                let geometry = self.geometry(Side::Base, base_number - 1).into_result()?;
                Ok(self
                    .comparator
                    .one_sided(position, base_number, geometry, ChangeType::Deleted))
            }
            (None, Some(compare_number)) => {
                let geometry = self.geometry(Side::Compare, compare_number - 1).into_result()?;
                Ok(self
                    .comparator
                    .one_sided(position, compare_number, geometry, ChangeType::Added))
            }
            (None, None) => Err(CompareError::Algorithm("page mapping has no pages".into())),
        }
    }

    fn stand_in(&self, position: u32, mapping: &PageMapping, status: PageStatus, note: String) -> PageDetails {
        let mut details = PageDetails::new(position, mapping.base_page_number, mapping.compare_page_number);
        details.status = status;
        details.note = Some(note);
        details.base_dimensions = mapping
            .base_page_number
            .map(|n| self.known_geometry(Side::Base, n - 1).unwrap_or(PageGeometry::LETTER));
        details.compare_dimensions = mapping
            .compare_page_number
            .map(|n| self.known_geometry(Side::Compare, n - 1).unwrap_or(PageGeometry::LETTER));
        details
    }

    /// Deterministic stand-in for a page whose task failed or timed out:
    /// blank, page-sized, no differences.
    fn placeholder(&self, position: u32, mapping: &PageMapping, note: String) -> PageDetails {
        self.stand_in(position, mapping, PageStatus::Placeholder, note)
    }

    fn skipped(&self, position: u32, mapping: &PageMapping) -> PageDetails {
        self.stand_in(
            position,
            mapping,
            PageStatus::Skipped,
            "Not compared: long document was sampled (set exhaustiveProcessing to compare every page)".into(),
        )
    }
}

/// Copy per-page difference counts onto the mappings and pairs. Pages are
/// in aligned order, one per mapping.
fn fill_difference_counts(pairs: &mut [DocumentPair], pages: &[PageDetails]) {
    let mut counts = pages.iter().map(PageDetails::difference_count);
    for pair in pairs.iter_mut() {
        pair.total_differences = 0;
        for mapping in pair.page_mappings.iter_mut() {
            mapping.difference_count = counts.next().unwrap_or(0);
            pair.total_differences += mapping.difference_count;
        }
    }
}

fn summarize(mappings: &[PageMapping], pages: &[PageDetails]) -> Summary {
    let mut counts_by_type = TypeCounts::default();
    let mut counts_by_severity = SeverityCounts::default();
    let (mut pages_compared, mut placeholder_pages, mut skipped_pages) = (0, 0, 0);
    for page in pages {
        counts_by_type.merge(&page.counts_by_type);
        for difference in page.differences() {
            counts_by_severity.increment(difference.severity);
        }
        match page.status {
            PageStatus::Compared => pages_compared += 1,
            PageStatus::Placeholder => placeholder_pages += 1,
            PageStatus::Skipped => skipped_pages += 1,
        }
    }

    // Unpaired pages carry a similarity of zero.
    let overall_similarity_score = if mappings.is_empty() {
        1.0
    } else {
        mappings.iter().map(|m| m.similarity_score).sum::<f64>() / mappings.len() as f64
    };

    Summary {
        overall_similarity_score,
        total_differences: counts_by_type.total(),
        counts_by_type,
        counts_by_severity,
        pages_compared,
        placeholder_pages,
        skipped_pages,
    }
}

fn status_message(warnings: &[String], plan: &SamplingPlan) -> String {
    let mut message = if warnings.is_empty() {
        "Comparison completed".to_string()
    } else {
        format!("Comparison completed with non-fatal warnings: {}", warnings.join("; "))
    };
    if plan.is_sampled() {
        message.push_str(&format!(" (sampled {} pages)", plan.selected_count()));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use docdelta_core::config::keys;
    use docdelta_core::{DifferenceType, Rect};

    use crate::sink::MemorySink;
    use crate::testing::{FakeExtractor, FakePage, init_tracing, text_page};

    fn quick_config() -> EngineConfig {
        EngineConfig {
            worker_threads: Some(4),
            fingerprint_dpi: 18,
            render_dpi: 36,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 5,
            ..EngineConfig::default()
        }
    }

    fn refs() -> (DocumentRef, DocumentRef) {
        (
            DocumentRef::new("base", "base.pdf", "mem://base"),
            DocumentRef::new("compare", "compare.pdf", "mem://compare"),
        )
    }

    fn distinct_pages(range: std::ops::Range<usize>) -> Vec<FakePage> {
        range
            .map(|i| {
                let heading = format!("Section{i} heading{i}");
                let body = format!("body{i} text{i} words{i}");
                text_page(&[&heading, &body])
            })
            .collect()
    }

    fn orchestrator(fake: FakeExtractor, config: EngineConfig) -> (Orchestrator, Arc<MemorySink>) {
        init_tracing();
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::new(Arc::new(fake), Arc::clone(&sink) as Arc<dyn ResultSink>, config);
        (orchestrator, sink)
    }

    fn comparison(options: &[(&str, &str)]) -> Comparison {
        let (base, compare) = refs();
        let options = options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Comparison::new(base, compare, options)
    }

    #[test]
    fn appended_pages_form_a_compare_only_pair() {
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..5))
            .with_document("compare", distinct_pages(0..7));
        let (orchestrator, sink) = orchestrator(fake, quick_config());
        let mut comparison = comparison(&[]);

        let result = orchestrator.run(&mut comparison).expect("completes");

        assert_eq!(comparison.status, ComparisonStatus::Completed);
        assert!(comparison.processing_warning.is_none());
        assert_eq!(comparison.progress(), 1.0);
        assert_eq!(result.document_pairs.len(), 2);
        let (matched, added) = (&result.document_pairs[0], &result.document_pairs[1]);
        assert!(matched.matched);
        assert!((matched.similarity_score - 1.0).abs() < 1e-9);
        assert_eq!(matched.total_differences, 0);
        assert!(!added.has_base_document);
        assert_eq!(added.compare_page_count, 2);
        assert_eq!(added.total_differences, 2);

        assert_eq!(result.page_details.len(), 7);
        assert_eq!(result.summary.total_differences, 2);
        assert_eq!(result.summary.counts_by_type.metadata, 2);
        assert_eq!(result.summary.counts_by_severity.major, 2);
        let page6 = result.page(6).expect("page 6");
        assert!(!page6.page_exists_in_base);
        assert_eq!(page6.compare_differences[0].change_type, ChangeType::Added);
        assert!(!result.are_documents_identical());
        assert_eq!(sink.get(&comparison.id), Some(result));
    }

    #[test]
    fn appended_word_is_the_only_difference() {
        let mut base = distinct_pages(0..2);
        base.push(text_page(&["Quarterly summary", "Hello"]));
        let mut compare = distinct_pages(0..2);
        compare.push(text_page(&["Quarterly summary", "Hello World"]));
        let fake = FakeExtractor::new()
            .with_document("base", base)
            .with_document("compare", compare);
        let (orchestrator, _) = orchestrator(fake, quick_config());
        let mut comparison = comparison(&[(keys::TEXT_COMPARISON_METHOD, "word")]);

        let result = orchestrator.run(&mut comparison).expect("completes");

        assert_eq!(result.summary.total_differences, 1);
        assert!(!result.are_documents_identical());
        let page3 = result.page(3).expect("page 3");
        assert_eq!(page3.compare_differences.len(), 1);
        let diff = &page3.compare_differences[0];
        assert_eq!(diff.difference_type, DifferenceType::Text);
        assert_eq!(diff.change_type, ChangeType::Added);
        assert_eq!(diff.compare_text.as_deref(), Some("World"));
        assert_eq!(diff.id, "p3-text-1");
        assert!(diff.has_valid_geometry());
        assert_eq!(result.document_pairs[0].page_mappings[2].difference_count, 1);
    }

    #[test]
    fn identical_documents_are_identical() {
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..3))
            .with_document("compare", distinct_pages(0..3));
        let (orchestrator, _) = orchestrator(fake, quick_config());
        let (base, compare) = refs();
        let result = orchestrator
            .compare_documents(base, compare, ComparisonId::new())
            .expect("completes");
        assert!(result.are_documents_identical());
        assert!((result.summary.overall_similarity_score - 1.0).abs() < 1e-9);
        assert_eq!(result.summary.pages_compared, 3);
    }

    #[test]
    fn slow_page_becomes_placeholder_and_comparison_completes() {
        let base = distinct_pages(0..3);
        let mut compare = distinct_pages(0..3);
        compare[1].image_delay = Some(Duration::from_secs(3));
        let fake = FakeExtractor::new()
            .with_document("base", base)
            .with_document("compare", compare);
        let config = EngineConfig {
            aggregate_deadline_secs: 1,
            ..quick_config()
        };
        let (orchestrator, _) = orchestrator(fake, config);
        let mut comparison = comparison(&[]);

        let result = orchestrator.run(&mut comparison).expect("completes despite timeout");

        assert_eq!(comparison.status, ComparisonStatus::Completed);
        assert!(comparison.processing_warning.is_some());
        let message = comparison.status_message.as_deref().unwrap_or_default();
        assert!(message.contains("warning"), "{message}");

        let slow = result.page(2).expect("page 2");
        assert_eq!(slow.status, PageStatus::Placeholder);
        assert!(slow.base_differences.is_empty() && slow.compare_differences.is_empty());
        assert!(slow.note.as_deref().is_some_and(|note| note.contains("deadline")));
        assert_eq!(slow.compare_dimensions, Some(PageGeometry::LETTER));
        assert_eq!(result.page(1).map(|p| p.status), Some(PageStatus::Compared));
        assert_eq!(result.summary.placeholder_pages, 1);
    }

    #[test]
    fn transient_page_failure_is_retried() {
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..2))
            .with_document("compare", distinct_pages(0..2))
            .with_flaky_images("compare", 1, 2);
        let (orchestrator, _) = orchestrator(fake, quick_config());
        let mut comparison = comparison(&[]);

        let result = orchestrator.run(&mut comparison).expect("completes");

        assert_eq!(result.page(2).map(|p| p.status), Some(PageStatus::Compared));
        assert!(comparison.processing_warning.is_none());
    }

    #[test]
    fn exhausted_retries_produce_a_placeholder() {
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..2))
            .with_document("compare", distinct_pages(0..2))
            .with_flaky_images("compare", 0, 10);
        let (orchestrator, _) = orchestrator(fake, quick_config());
        let mut comparison = comparison(&[]);

        let result = orchestrator.run(&mut comparison).expect("completes");

        let page = result.page(1).expect("page 1");
        assert_eq!(page.status, PageStatus::Placeholder);
        assert!(page.note.as_deref().is_some_and(|note| note.contains("image stream")));
        assert_eq!(comparison.status, ComparisonStatus::Completed);
        assert!(
            comparison
                .processing_warning
                .as_deref()
                .is_some_and(|w| w.contains("3 attempts"))
        );
    }

    #[test]
    fn unreadable_document_fails_the_comparison() {
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..1))
            .with_document("compare", distinct_pages(0..1))
            .with_unreadable("base");
        let (orchestrator, sink) = orchestrator(fake, quick_config());
        let mut comparison = comparison(&[]);

        let err = orchestrator.run(&mut comparison).expect_err("must fail");

        assert!(matches!(err, CompareError::DocumentLoad(_)));
        assert_eq!(comparison.status, ComparisonStatus::Failed);
        assert!(comparison.completed_at.is_some());
        assert!(
            comparison
                .status_message
                .as_deref()
                .is_some_and(|m| m.contains("not a PDF"))
        );
        assert!(sink.is_empty());
    }

    struct BrokenSink;

    impl ResultSink for BrokenSink {
        fn store(&self, _: &ComparisonResult) -> Result<String> {
            Err(CompareError::Storage("volume is read-only".into()))
        }
    }

    #[test]
    fn storage_failure_fails_the_comparison() {
        init_tracing();
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..1))
            .with_document("compare", distinct_pages(0..1));
        let orchestrator = Orchestrator::new(Arc::new(fake), Arc::new(BrokenSink), quick_config());
        let mut comparison = comparison(&[]);

        let err = orchestrator.run(&mut comparison).expect_err("must fail");

        assert!(matches!(err, CompareError::Storage(_)));
        assert_eq!(comparison.status, ComparisonStatus::Failed);
        assert!(comparison.result_location.is_none());
    }

    #[test]
    fn long_documents_are_sampled_unless_exhaustive() {
        let config = EngineConfig {
            sampling_page_threshold: 10,
            sampling_edge_pages: 2,
            sampling_stride: 5,
            ..quick_config()
        };
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..15))
            .with_document("compare", distinct_pages(0..15));
        let (orchestrator, _) = orchestrator(fake, config);

        let mut sampled = comparison(&[]);
        let result = orchestrator.run(&mut sampled).expect("completes");
        assert_eq!(result.page_details.len(), 15);
        assert_eq!(result.summary.pages_compared, 6);
        assert_eq!(result.summary.skipped_pages, 9);
        assert_eq!(result.page(3).map(|p| p.status), Some(PageStatus::Skipped));
        assert!(sampled.status_message.as_deref().is_some_and(|m| m.contains("sampled")));

        let mut full = comparison(&[(keys::EXHAUSTIVE_PROCESSING, "true")]);
        let result = orchestrator.run(&mut full).expect("completes");
        assert_eq!(result.summary.pages_compared, 15);
        assert_eq!(result.summary.skipped_pages, 0);
    }

    fn three_page_fake() -> Arc<FakeExtractor> {
        Arc::new(
            FakeExtractor::new()
                .with_document("base", distinct_pages(0..3))
                .with_document("compare", distinct_pages(0..3)),
        )
    }

    #[test]
    fn repeated_comparison_reuses_a_shared_cache() {
        let fake = three_page_fake();
        let cache = Arc::new(AnalysisCache::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&fake) as Arc<dyn ExtractionService>,
            Arc::new(MemorySink::new()),
            quick_config(),
        )
        .with_cache(Arc::clone(&cache));
        let (base, compare) = refs();
        orchestrator
            .compare_documents(base.clone(), compare.clone(), ComparisonId::new())
            .expect("first run");
        let calls = fake.text_calls();
        assert_eq!(calls, 6);

        orchestrator
            .compare_documents(base, compare, ComparisonId::new())
            .expect("second run");
        assert_eq!(fake.text_calls(), calls);
        assert_eq!(cache.fingerprints.len(), 6);
    }

    #[test]
    fn per_comparison_cache_is_released_after_the_run() {
        let fake = three_page_fake();
        let orchestrator = Orchestrator::new(
            Arc::clone(&fake) as Arc<dyn ExtractionService>,
            Arc::new(MemorySink::new()),
            quick_config(),
        );
        assert!(orchestrator.shared_cache().is_none());
        let (base, compare) = refs();

        orchestrator
            .compare_documents(base.clone(), compare.clone(), ComparisonId::new())
            .expect("first run");
        assert_eq!(fake.text_calls(), 6);
        orchestrator
            .compare_documents(base, compare, ComparisonId::new())
            .expect("second run");
        assert_eq!(fake.text_calls(), 12);
    }

    #[test]
    fn concurrent_comparisons_report_their_own_progress() {
        let fake = FakeExtractor::new()
            .with_document("base", distinct_pages(0..5))
            .with_document("compare", distinct_pages(0..5))
            .with_document("long-base", distinct_pages(10..19))
            .with_document("long-compare", distinct_pages(10..19));
        let events: Arc<Mutex<Vec<(ComparisonId, u32, u32)>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&events);
        let (orchestrator, _) = orchestrator(fake, quick_config());
        let orchestrator = orchestrator.with_progress_listener(Arc::new(move |id: &ComparisonId, completed: u32, total: u32| {
            recorder.lock().expect("events").push((*id, completed, total));
        }));

        let (short_id, long_id) = (ComparisonId::new(), ComparisonId::new());
        std::thread::scope(|scope| {
            let (base, compare) = refs();
            let short = scope.spawn(|| orchestrator.compare_documents(base, compare, short_id));
            let long = scope.spawn(|| {
                orchestrator.compare_documents(
                    DocumentRef::new("long-base", "long-base.pdf", "mem://long-base"),
                    DocumentRef::new("long-compare", "long-compare.pdf", "mem://long-compare"),
                    long_id,
                )
            });
            short.join().expect("short thread").expect("short run");
            long.join().expect("long thread").expect("long run");
        });

        let events = events.lock().expect("events");
        for (id, expected_total) in [(short_id, 5), (long_id, 9)] {
            let seen: Vec<(u32, u32)> = events
                .iter()
                .filter(|(event_id, _, _)| *event_id == id)
                .map(|(_, completed, total)| (*completed, *total))
                .collect();
            assert!(!seen.is_empty());
            assert!(seen.iter().all(|(completed, total)| *total == expected_total && completed <= total));
            assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
            assert_eq!(seen.last(), Some(&(expected_total, expected_total)));
        }
    }

    #[test]
    fn pages_without_text_are_compared_visually() {
        let mut base = FakePage::blank();
        base.marks.push(Rect::new(100.0, 100.0, 200.0, 200.0));
        let mut compare = base.clone();
        compare.marks.push(Rect::new(350.0, 450.0, 120.0, 120.0));
        let fake = FakeExtractor::new()
            .with_document("base", vec![base])
            .with_document("compare", vec![compare]);
        let (orchestrator, _) = orchestrator(fake, quick_config());
        let mut comparison = comparison(&[(keys::DIFFERENCE_THRESHOLD, "0.01")]);

        let result = orchestrator.run(&mut comparison).expect("completes");

        assert_eq!(result.summary.total_differences, 1);
        let diff = &result.page_details[0].compare_differences[0];
        assert_eq!(diff.difference_type, DifferenceType::Image);
        assert_eq!(diff.change_type, ChangeType::Modified);
        assert!(diff.compare_coordinates.is_some());
        assert!(diff.has_valid_geometry());
    }
}
