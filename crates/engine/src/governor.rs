//! QPS governor
//!
//! Throughput workers take a slot from the per-second [`QpsWindow`] before
//! every statement. Admission is part of the worker's own path: once the
//! window's admitted statements (minus those that failed) reach the target,
//! further requests are refused and the window reads as paused. Workers check
//! before every statement, so a batch stops mid-list.
//!
//! One governor thread only advances the window: at each second boundary it
//! takes the counters, which empties the window and lifts the pause.
//!
//! Statements admitted just before a boundary may complete after it, so a
//! window can exceed the target by at most one statement per worker.

use sct_core::{Statistics, StatsSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Length of one governor window.
pub const WINDOW: Duration = Duration::from_secs(1);

/// Interval between governor checks.
pub const TICK: Duration = Duration::from_micros(100);

/// Statement counters and admissions of the current one-second window.
#[derive(Debug)]
pub struct QpsWindow {
    counts: Statistics,
    admitted: AtomicU64,
    target: u64,
}

impl QpsWindow {
    /// Window regulating to `target` successful statements per second.
    pub fn new(target: u64) -> Self {
        Self {
            counts: Statistics::new(),
            admitted: AtomicU64::new(0),
            target,
        }
    }

    /// Reserve a slot for one statement; `false` once the budget is spent.
    ///
    /// Failed statements give their slot back, so the budget bounds the
    /// successful statements of the window.
    pub fn try_acquire(&self) -> bool {
        let failed = self.counts.failed();
        let target = self.target;
        let acquired = self
            .admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n.saturating_sub(failed) < target).then_some(n + 1)
            })
            .is_ok();
        if !acquired {
            trace!(target: "sct::governor", target_qps = target, "budget spent");
        }
        acquired
    }

    /// Count one statement.
    pub fn record(&self, passed: bool) {
        self.counts.record(passed);
    }

    /// Whether workers must hold off issuing statements.
    pub fn is_paused(&self) -> bool {
        let used = self
            .admitted
            .load(Ordering::Acquire)
            .saturating_sub(self.counts.failed());
        used >= self.target
    }

    /// Target successful statements per window.
    pub fn target(&self) -> u64 {
        self.target
    }

    /// Counters of the current window.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.counts.snapshot()
    }

    /// Empty the window, returning what it counted.
    fn close(&self) -> StatsSnapshot {
        let done = self.counts.take();
        self.admitted.store(0, Ordering::Release);
        done
    }
}

/// Single writer of the window boundaries.
pub struct QpsGovernor<'a> {
    window: &'a QpsWindow,
    window_start: Instant,
}

impl<'a> QpsGovernor<'a> {
    /// Governor whose first window starts at `now`.
    pub fn new(window: &'a QpsWindow, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
        }
    }

    /// Advance the governor to `now`.
    ///
    /// Returns the counts of the window that closed, if `now` crossed a
    /// boundary.
    pub fn tick(&mut self, now: Instant) -> Option<StatsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < WINDOW {
            return None;
        }
        let done = self.window.close();
        trace!(target: "sct::governor", total = done.total, failed = done.failed, "window closed");
        // Stay aligned to whole seconds from the start of the run.
        self.window_start += Duration::from_secs(elapsed.as_secs());
        Some(done)
    }

    /// Tick every [`TICK`] until `should_quit` returns true.
    ///
    /// Returns the counts of every window closed during the run, oldest first.
    pub fn run(mut self, should_quit: impl Fn() -> bool) -> Vec<StatsSnapshot> {
        let mut closed = Vec::new();
        while !should_quit() {
            closed.extend(self.tick(Instant::now()));
            std::thread::sleep(TICK);
        }
        closed
    }
}
