//! Workers
//!
//! Every mode implements the same lifecycle: [`Worker::prepare`] once,
//! [`Worker::run_iteration`] while the run context hands out iterations, and
//! [`Worker::cleanup`] on every exit path. The variant is picked once per run
//! from the configured [`TestMode`] and dispatched through [`ModeWorker`].
//!
//! Workers update the run statistics themselves: consistency and churn
//! workers count iterations, the throughput worker counts statements.

mod churn;
mod consistency;
mod throttled;

pub use churn::ChurnWorker;
pub use consistency::{pick_new_value, ConsistencyWorker};
pub use throttled::ThrottledWorker;

use crate::context::RunContext;
use crate::error::WorkerResult;
use sct_core::{Connector, TestMode};
use tracing::{error, info};

/// Result of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Iteration met its success criterion
    Passed,
    /// Iteration failed and was counted as failed
    Failed,
    /// Verification could not be performed (e.g. replica unavailable) or
    /// the iteration was interrupted; not counted as failed
    Inconclusive,
}

/// Lifecycle shared by all workers.
pub trait Worker {
    /// One-time setup: open sessions, create and populate tables.
    fn prepare(&mut self) -> WorkerResult<()>;

    /// Execute one iteration and record it in the run statistics.
    fn run_iteration(&mut self) -> WorkerResult<Outcome>;

    /// Release resources. Called after `prepare` whether or not it succeeded.
    fn cleanup(&mut self);
}

/// The worker variant selected for a run.
pub enum ModeWorker<'a, C: Connector> {
    /// `sct` mode
    Consistency(ConsistencyWorker<'a, C>),
    /// `shortct` mode
    Churn(ChurnWorker<'a, C>),
    /// `qps` mode
    Throttled(ThrottledWorker<'a, C>),
}

impl<'a, C: Connector> ModeWorker<'a, C> {
    /// Build the worker for the configured mode.
    pub fn for_mode(ctx: &'a RunContext<C>, thread_id: usize) -> Self {
        match ctx.config().test_mode {
            TestMode::Consistency => Self::Consistency(ConsistencyWorker::new(ctx, thread_id)),
            TestMode::Churn => Self::Churn(ChurnWorker::new(ctx, thread_id)),
            TestMode::ThrottledLoad => Self::Throttled(ThrottledWorker::new(ctx, thread_id)),
        }
    }
}

impl<C: Connector> Worker for ModeWorker<'_, C> {
    fn prepare(&mut self) -> WorkerResult<()> {
        match self {
            Self::Consistency(w) => w.prepare(),
            Self::Churn(w) => w.prepare(),
            Self::Throttled(w) => w.prepare(),
        }
    }

    fn run_iteration(&mut self) -> WorkerResult<Outcome> {
        match self {
            Self::Consistency(w) => w.run_iteration(),
            Self::Churn(w) => w.run_iteration(),
            Self::Throttled(w) => w.run_iteration(),
        }
    }

    fn cleanup(&mut self) {
        match self {
            Self::Consistency(w) => w.cleanup(),
            Self::Churn(w) => w.cleanup(),
            Self::Throttled(w) => w.cleanup(),
        }
    }
}

/// Drive `worker` until the context stops handing out iterations.
///
/// Returns the number of iterations this worker completed.
pub fn drive<W: Worker, C: Connector>(worker: &mut W, ctx: &RunContext<C>) -> WorkerResult<u64> {
    let result = worker.prepare().and_then(|()| {
        let mut completed = 0;
        while ctx.claim_iteration() {
            worker.run_iteration()?;
            completed += 1;
        }
        Ok(completed)
    });
    worker.cleanup();
    result
}

/// Thread body: build the mode's worker, drive it, log the outcome.
pub fn run_worker<C: Connector>(ctx: &RunContext<C>, thread_id: usize) {
    let detail = ctx.config().detail_log;
    if detail {
        info!(target: "sct::worker", thread_id, "start thread");
    }

    let mut worker = ModeWorker::for_mode(ctx, thread_id);
    match drive(&mut worker, ctx) {
        Ok(iterations) => {
            if detail {
                info!(target: "sct::worker", thread_id, iterations, "stop thread");
            }
        }
        Err(e) => {
            ctx.record_abort();
            error!(target: "sct::worker", thread_id, error = %e, "worker aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use sct_client::SimCluster;
    use sct_core::TestConfig;

    #[derive(Default)]
    struct Scripted {
        fail_prepare: bool,
        fail_at: Option<u64>,
        iterations: u64,
        cleaned: bool,
    }

    impl Worker for Scripted {
        fn prepare(&mut self) -> WorkerResult<()> {
            if self.fail_prepare {
                return Err(WorkerError::MissingRow {
                    table: "t".into(),
                    key: 1,
                });
            }
            Ok(())
        }

        fn run_iteration(&mut self) -> WorkerResult<Outcome> {
            self.iterations += 1;
            if self.fail_at == Some(self.iterations) {
                return Err(WorkerError::MissingRow {
                    table: "t".into(),
                    key: self.iterations,
                });
            }
            Ok(Outcome::Passed)
        }

        fn cleanup(&mut self) {
            self.cleaned = true;
        }
    }

    fn context(iterations: u64) -> RunContext<SimCluster> {
        let cfg = TestConfig {
            iterations,
            ..TestConfig::default()
        };
        RunContext::new(cfg, SimCluster::new(), Vec::new())
    }

    #[test]
    fn test_drive_runs_until_budget() {
        let ctx = context(7);
        let mut w = Scripted::default();
        assert_eq!(drive(&mut w, &ctx).unwrap(), 7);
        assert!(w.cleaned);
    }

    #[test]
    fn test_drive_cleans_up_after_failed_prepare() {
        let ctx = context(7);
        let mut w = Scripted {
            fail_prepare: true,
            ..Scripted::default()
        };
        assert!(drive(&mut w, &ctx).is_err());
        assert_eq!(w.iterations, 0);
        assert!(w.cleaned);
    }

    #[test]
    fn test_drive_stops_on_iteration_error() {
        let ctx = context(10);
        let mut w = Scripted {
            fail_at: Some(3),
            ..Scripted::default()
        };
        assert!(drive(&mut w, &ctx).is_err());
        assert_eq!(w.iterations, 3);
        assert!(w.cleaned);
    }

    #[test]
    fn test_run_worker_records_abort_on_connect_failure() {
        // No nodes registered: every connect is refused.
        let cfg = TestConfig {
            host_rw: Some("rw".into()),
            port_rw: Some(3306),
            host_ro: Some("ro".into()),
            database: Some("test".into()),
            ..TestConfig::default()
        };
        let ctx = RunContext::new(cfg, SimCluster::new(), Vec::new());
        run_worker(&ctx, 0);
        assert_eq!(ctx.aborted_workers(), 1);
        assert_eq!(ctx.stats().total(), 0);
    }
}
