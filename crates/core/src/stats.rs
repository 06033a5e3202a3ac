//! Lock-free pass/fail counters
//!
//! `Statistics` is shared by every worker of a run. Counters only grow during a
//! run; a reader takes a [`StatsSnapshot`] and computes rates by diffing two
//! snapshots.
//!
//! ## Ordering
//!
//! Writers always bump `total` before `failed` (see [`Statistics::record`]) and
//! readers load `failed` before `total`, both with acquire/release ordering.
//! A snapshot therefore never reports `failed > total`, even though the two
//! loads are not one atomic transaction.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared run counters.
#[derive(Debug, Default)]
pub struct Statistics {
    total: AtomicU64,
    failed: AtomicU64,
}

impl Statistics {
    /// Create zeroed counters.
    pub const fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Count one attempted unit of work.
    pub fn increment_total(&self) {
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    /// Count one failed unit of work.
    ///
    /// Callers must have counted the same unit with [`increment_total`] first.
    ///
    /// [`increment_total`]: Statistics::increment_total
    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }

    /// Count one unit of work and, if it did not pass, one failure.
    pub fn record(&self, passed: bool) {
        self.increment_total();
        if !passed {
            self.increment_failed();
        }
    }

    /// Point-in-time copy of both counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let failed = self.failed.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        StatsSnapshot { total, failed }
    }

    /// Current value of the total counter.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Current value of the failed counter.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }

    /// Zero both counters and return the values they held.
    ///
    /// Each counter is swapped atomically; a unit recorded between the two
    /// swaps may have its total and its failure land on different sides.
    pub fn take(&self) -> StatsSnapshot {
        let failed = self.failed.swap(0, Ordering::AcqRel);
        let total = self.total.swap(0, Ordering::AcqRel);
        StatsSnapshot { total, failed }
    }

    /// Zero both counters.
    ///
    /// Only meant for short-lived windows; use [`Statistics::take`] when the
    /// old values are needed. Snapshots racing a reset may mix pre- and
    /// post-reset values.
    pub fn reset(&self) {
        self.failed.store(0, Ordering::Release);
        self.total.store(0, Ordering::Release);
    }
}

/// Immutable copy of [`Statistics`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Attempted units of work
    pub total: u64,
    /// Failed units of work
    pub failed: u64,
}

impl StatsSnapshot {
    /// Units of work that did not fail.
    pub fn passed(&self) -> u64 {
        self.total.saturating_sub(self.failed)
    }

    /// Counter growth between `earlier` and `self`.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.saturating_sub(earlier.total),
            failed: self.failed.saturating_sub(earlier.failed),
        }
    }

    /// Integer per-second rates over `interval_secs`: (total, failed).
    pub fn per_second(&self, interval_secs: u64) -> (u64, u64) {
        if interval_secs == 0 {
            return (self.total, self.failed);
        }
        (self.total / interval_secs, self.failed / interval_secs)
    }
}
