// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for page tasks: exponential backoff with jitter, a per-attempt
// time budget and the aggregate deadline of the batch.
//
// Only recoverable errors are retried. Fatal errors (document load, storage)
// are returned immediately so the orchestrator can fail the comparison.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use docdelta_core::{CompareError, EngineConfig, ErrorClass, Result};
use tracing::{debug, warn};

/// Retry and timeout settings for one comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per task, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// An attempt that takes longer than this is not retried.
    pub attempt_timeout: Duration,
    /// Budget for the whole batch of page tasks.
    pub aggregate_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry; the error is fatal.
    GiveUp(ErrorClass),
    /// The failed attempt alone used up the per-attempt budget.
    TooSlow,
    /// Maximum attempts exhausted.
    Exhausted,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            aggregate_deadline: Duration::from_secs(config.aggregate_deadline_secs),
        }
    }

    /// Instant at which a batch started at `start` must stop.
    pub fn deadline_from(&self, start: Instant) -> Instant {
        start + self.aggregate_deadline
    }

    /// Decide whether to retry after attempt number `attempt` (1-based)
    /// failed with `err` after running for `elapsed`.
    pub fn should_retry(&self, err: &CompareError, attempt: u32, elapsed: Duration) -> RetryDecision {
        match err.class() {
            ErrorClass::Fatal => RetryDecision::GiveUp(ErrorClass::Fatal),
            ErrorClass::Recoverable if elapsed > self.attempt_timeout => {
                warn!(attempt, elapsed_ms = elapsed.as_millis() as u64, "attempt exceeded its time budget");
                RetryDecision::TooSlow
            }
            ErrorClass::Recoverable if attempt >= self.max_attempts => {
                warn!(attempt, max = self.max_attempts, "retry limit exhausted");
                RetryDecision::Exhausted
            }
            ErrorClass::Recoverable => {
                let delay = self.compute_delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }

    /// Exponential backoff delay with jitter.
    ///
    /// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
        let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
        Duration::from_millis(total_ms.min(self.max_delay.as_millis() as u64))
    }

    /// Run `op` until it succeeds, the policy gives up, `cancel` is raised or
    /// `deadline` would be overrun by the next backoff. `op` receives the
    /// 1-based attempt number.
    pub fn run<T>(
        &self,
        deadline: Instant,
        cancel: &AtomicBool,
        mut op: impl FnMut(u32) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 1;
        loop {
            if cancel.load(Ordering::Relaxed) || Instant::now() >= deadline {
                return Err(CompareError::Timeout {
                    seconds: self.aggregate_deadline.as_secs(),
                });
            }
            let started = Instant::now();
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            match self.should_retry(&err, attempt, started.elapsed()) {
                RetryDecision::RetryAfter(delay) if Instant::now() + delay < deadline => {
                    thread::sleep(delay);
                    attempt += 1;
                }
                _ => return Err(err),
            }
        }
    }
}

/// Deterministic jitter spread across [0, base).
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            attempt_timeout: Duration::from_secs(5),
            aggregate_deadline: Duration::from_secs(5),
        }
    }

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[test]
    fn delay_increases() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(60),
            ..quick()
        };
        let d0 = policy.compute_delay(0);
        let d1 = policy.compute_delay(1);
        let d2 = policy.compute_delay(2);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delay_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(1_000),
            ..quick()
        };
        assert_eq!(policy.compute_delay(20), Duration::from_millis(1_000));
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let decision = quick().should_retry(&CompareError::Storage("disk full".into()), 1, Duration::ZERO);
        assert_eq!(decision, RetryDecision::GiveUp(ErrorClass::Fatal));
    }

    #[test]
    fn slow_attempt_is_not_retried() {
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_millis(10),
            ..quick()
        };
        let err = CompareError::Extraction("slow".into());
        assert_eq!(policy.should_retry(&err, 1, Duration::from_secs(1)), RetryDecision::TooSlow);
    }

    #[test]
    fn transient_failure_succeeds_on_a_later_attempt() {
        let calls = Cell::new(0);
        let result = quick().run(far(), &AtomicBool::new(false), |attempt| {
            calls.set(attempt);
            if attempt < 3 {
                Err(CompareError::Extraction("flaky".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.expect("third attempt succeeds"), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhaustion_returns_the_last_error() {
        let calls = Cell::new(0);
        let result: Result<()> = quick().run(far(), &AtomicBool::new(false), |_| {
            calls.set(calls.get() + 1);
            Err(CompareError::Render("no renderer".into()))
        });
        assert!(matches!(result, Err(CompareError::Render(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn cancelled_task_does_not_start() {
        let result: Result<()> = quick().run(far(), &AtomicBool::new(true), |_| {
            panic!("must not run once cancelled");
        });
        assert!(matches!(result, Err(CompareError::Timeout { .. })));
    }
}
