// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded worker pool for page tasks.
//
// Tasks run on a dedicated rayon pool and report back over a crossbeam
// channel. The collecting thread waits until every task has reported or the
// aggregate deadline passes; on expiry it raises the shared cancellation
// flag and returns whatever arrived. Tasks that have not started yet see the
// flag and skip their work. Running tasks are not interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use crossbeam_channel::RecvTimeoutError;
use docdelta_core::{CompareError, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, warn};

/// Upper bound on the default pool size.
const MAX_DEFAULT_THREADS: usize = 4;

/// `configured` if set, otherwise half the cores capped at four; never less
/// than one and never more than there are tasks.
pub fn pool_size(configured: Option<usize>, tasks: usize) -> usize {
    let default = (num_cpus::get() / 2).min(MAX_DEFAULT_THREADS);
    configured.unwrap_or(default).max(1).min(tasks.max(1))
}

/// Progress of the current batch, readable from any thread.
#[derive(Debug, Default)]
pub struct Progress {
    completed: AtomicU32,
    total: AtomicU32,
}

impl Progress {
    pub fn reset(&self, total: u32) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    /// Count one finished operation; returns the new completed count.
    pub fn advance(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u32 {
        self.total.load(Ordering::Relaxed)
    }
}

/// What came back from a batch. `results[i]` is `None` when task `i` did not
/// report before the deadline, was skipped after cancellation, or panicked.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    pub results: Vec<Option<R>>,
    pub timed_out: bool,
}

impl<R> BatchOutcome<R> {
    pub fn missing(&self) -> Vec<usize> {
        self.results
            .iter()
            .enumerate()
            .filter(|(_, result)| result.is_none())
            .map(|(index, _)| index)
            .collect()
    }
}

pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("docdelta-worker-{index}"))
            .panic_handler(|_| error!("page task panicked"))
            .build()
            .map_err(|e| CompareError::Io(std::io::Error::other(format!("worker pool: {e}"))))?;
        debug!(threads, "worker pool started");
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `work` over every task, calling `on_result` on the collecting
    /// thread as each result arrives (in completion order).
    pub fn run_batch<T, R, F>(
        &self,
        tasks: Vec<T>,
        deadline: Instant,
        cancel: &Arc<AtomicBool>,
        work: F,
        mut on_result: impl FnMut(usize, &R),
    ) -> BatchOutcome<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T, &AtomicBool) -> R + Send + Sync + 'static,
    {
        let total = tasks.len();
        let (tx, rx) = crossbeam_channel::unbounded();
        let work = Arc::new(work);

        for (index, task) in tasks.into_iter().enumerate() {
            let tx = tx.clone();
            let work = Arc::clone(&work);
            let cancel = Arc::clone(cancel);
            self.pool.spawn(move || {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let result = work(task, &cancel);
                // The collector may already have given up on this batch.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        let mut received = 0;
        let mut timed_out = false;
        while received < total {
            match rx.recv_deadline(deadline) {
                Ok((index, result)) => {
                    on_result(index, &result);
                    results[index] = Some(result);
                    received += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    cancel.store(true, Ordering::Relaxed);
                    timed_out = true;
                    warn!(received, total, "batch deadline expired, cancelling remaining tasks");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(received, total, "workers stopped before every task reported");
                    break;
                }
            }
        }

        BatchOutcome { results, timed_out }
    }
}
