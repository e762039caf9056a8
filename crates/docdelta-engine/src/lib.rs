// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docdelta-engine: runs comparisons end to end. Pulls page artifacts through
// the `ExtractionService` seam, memoizes them, fans page work out over a
// bounded worker pool with retries and a deadline, and hands the assembled
// result to a `ResultSink`.

pub mod cache;
pub mod extraction;
pub mod orchestrator;
pub mod pool;
pub mod render;
pub mod retry;
pub mod sampling;
pub mod sink;

#[cfg(test)]
mod testing;

pub use cache::{AnalysisCache, PageKey, ResourceKey, WriteOnceCache};
pub use extraction::{DocumentInfo, ExtractionService, Outcome, RenderSettings};
pub use orchestrator::{Orchestrator, ProgressListener};
pub use pool::{Progress, WorkerPool, pool_size};
pub use render::{RenderQuality, RenderedPage, render_with_fallback};
pub use retry::{RetryDecision, RetryPolicy};
pub use sampling::SamplingPlan;
pub use sink::{JsonFileSink, MemorySink, ResultSink};
