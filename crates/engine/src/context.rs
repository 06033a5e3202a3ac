//! Per-run shared state
//!
//! A `RunContext` is built once per run and borrowed by every thread. It holds
//! the validated configuration, the connector, the run statistics and the
//! coordination atomics (shared iteration counter, active-thread counter and
//! quit flag). Nothing in it is process-global, so several runs can coexist in
//! one process (the test-suite relies on this).

use crate::governor::QpsWindow;
use sct_core::{Connector, Statistics, TestConfig, TestMode};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Longest uninterrupted slice of a quit-aware sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Shared state of one run.
pub struct RunContext<C: Connector> {
    config: TestConfig,
    connector: C,
    queries: Vec<String>,
    stats: Statistics,
    window: Option<QpsWindow>,
    /// Iterations claimed so far, across all workers
    claimed: AtomicU64,
    active_threads: AtomicUsize,
    aborted_workers: AtomicUsize,
    quit: AtomicBool,
    started: Instant,
}

impl<C: Connector> RunContext<C> {
    /// Build the context for a validated configuration.
    ///
    /// `queries` is the statement list used by churn and throughput workers.
    /// Throughput runs get a per-second window sized to `target_qps`.
    pub fn new(config: TestConfig, connector: C, queries: Vec<String>) -> Self {
        let window =
            (config.test_mode == TestMode::ThrottledLoad).then(|| QpsWindow::new(config.target_qps));
        Self {
            config,
            connector,
            queries,
            stats: Statistics::new(),
            window,
            claimed: AtomicU64::new(0),
            active_threads: AtomicUsize::new(0),
            aborted_workers: AtomicUsize::new(0),
            quit: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    /// Run configuration.
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Session factory shared by all workers.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Statement list for churn and throughput workers.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Run-wide statistics.
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Per-second window, present in throughput mode only.
    pub fn window(&self) -> Option<&QpsWindow> {
        self.window.as_ref()
    }

    /// Claim the next iteration.
    ///
    /// Returns `false` once the shared iteration bound is used up, the test
    /// time has elapsed, or a quit was requested. Each `true` is one unit of
    /// the shared `iterations` budget.
    pub fn claim_iteration(&self) -> bool {
        if self.should_quit() || self.time_exhausted() {
            return false;
        }
        match self.config.iteration_limit() {
            Some(limit) => self.claimed.fetch_add(1, Ordering::AcqRel) < limit,
            None => true,
        }
    }

    /// Iterations handed out so far (may exceed the bound by one per worker).
    pub fn claimed_iterations(&self) -> u64 {
        self.claimed.load(Ordering::Acquire)
    }

    /// Whether `test_time` is set and has elapsed.
    pub fn time_exhausted(&self) -> bool {
        self.config
            .test_time_limit()
            .is_some_and(|limit| self.started.elapsed() >= limit)
    }

    /// Time since the context was built.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Ask every thread of the run to stop at its next check.
    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Release);
    }

    /// Whether a quit was requested.
    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, waking early on quit.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep_unless_quit(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.should_quit() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    /// Count a worker as active until the returned guard is dropped.
    pub fn register_worker(&self) -> ActiveGuard<'_> {
        self.active_threads.fetch_add(1, Ordering::AcqRel);
        ActiveGuard {
            counter: &self.active_threads,
        }
    }

    /// Workers that have not finished yet.
    pub fn active_threads(&self) -> usize {
        self.active_threads.load(Ordering::Acquire)
    }

    /// Note that a worker ended early.
    pub fn record_abort(&self) {
        self.aborted_workers.fetch_add(1, Ordering::AcqRel);
    }

    /// Workers that ended early.
    pub fn aborted_workers(&self) -> usize {
        self.aborted_workers.load(Ordering::Acquire)
    }
}

/// RAII guard that decrements the active-thread counter on drop.
///
/// Moved into the worker thread, so the count drops on every exit path,
/// including unwinding.
pub struct ActiveGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sct_client::SimCluster;

    fn context(config: TestConfig) -> RunContext<SimCluster> {
        RunContext::new(config, SimCluster::new(), Vec::new())
    }

    #[test]
    fn test_iteration_budget_is_shared() {
        let ctx = context(TestConfig {
            iterations: 3,
            ..TestConfig::default()
        });
        let claimed = (0..10).filter(|_| ctx.claim_iteration()).count();
        assert_eq!(claimed, 3);
        assert!(!ctx.claim_iteration());
    }

    #[test]
    fn test_quit_stops_claims() {
        let ctx = context(TestConfig::default());
        assert!(ctx.claim_iteration());
        ctx.request_quit();
        assert!(!ctx.claim_iteration());
    }

    #[test]
    fn test_time_bounded_mode_has_no_iteration_limit() {
        let ctx = context(TestConfig {
            test_mode: TestMode::ThrottledLoad,
            target_qps: 10,
            test_time: 60,
            iterations: 1,
            ..TestConfig::default()
        });
        assert!((0..5).all(|_| ctx.claim_iteration()));
        assert!(ctx.window().is_some());
    }

    #[test]
    fn test_guard_decrements_on_drop() {
        let ctx = context(TestConfig::default());
        let a = ctx.register_worker();
        let b = ctx.register_worker();
        assert_eq!(ctx.active_threads(), 2);
        drop(a);
        assert_eq!(ctx.active_threads(), 1);
        drop(b);
        assert_eq!(ctx.active_threads(), 0);
    }

    #[test]
    fn test_sleep_wakes_on_quit() {
        let ctx = context(TestConfig::default());
        ctx.request_quit();
        let start = Instant::now();
        assert!(!ctx.sleep_unless_quit(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_completes() {
        let ctx = context(TestConfig::default());
        assert!(ctx.sleep_unless_quit(Duration::from_millis(5)));
    }
}
