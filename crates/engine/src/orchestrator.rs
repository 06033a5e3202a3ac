//! Run orchestration
//!
//! Lifecycle of one run: `Init → Running → Draining → Done`.
//!
//! - Init: the configuration is validated and the [`RunContext`] built
//! - Running: `concurrency` workers, the reporter and (throughput mode) the
//!   QPS governor run on named scoped threads
//! - Draining: workers are joined, then quit is signalled and the reporter
//!   and governor are joined
//! - Done: the cumulative [`RunSummary`] is available
//!
//! Threads are scoped, so the context is borrowed rather than reference
//! counted and every thread is joined before [`Orchestrator::run`] returns.

use crate::context::RunContext;
use crate::error::{RunError, RunResult};
use crate::governor::QpsGovernor;
use crate::reporter::Reporter;
use crate::worker::run_worker;
use sct_core::{Connector, StatsSnapshot, TestConfig, TestMode};
use std::fmt;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Context built, no thread started
    Init,
    /// Workers running
    Running,
    /// Waiting for threads to finish
    Draining,
    /// All threads joined
    Done,
}

/// Cumulative result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Mode that was run
    pub mode: TestMode,
    /// Final counters
    pub stats: StatsSnapshot,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Configured test time in seconds (0 if unbounded)
    pub test_time: u64,
    /// Workers started
    pub workers: usize,
    /// Workers that ended early on a setup or update error
    pub aborted_workers: usize,
    /// Counts of each completed governor window, oldest first (throughput
    /// mode only)
    pub windows: Vec<StatsSnapshot>,
}

impl RunSummary {
    /// Mean statements per second over the configured test time.
    pub fn mean_rate(&self) -> u64 {
        self.stats.total / self.test_time.max(1)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            TestMode::Consistency => write!(
                f,
                "Test strict consistency cnt: {}, failed cnt: {}",
                self.stats.total, self.stats.failed
            ),
            TestMode::Churn => write!(
                f,
                "Test connection/disconnect cnt: {}, failed cnt: {}",
                self.stats.total, self.stats.failed
            ),
            TestMode::ThrottledLoad => write!(
                f,
                "mean qps in all time: {}, failed cnt: {}",
                self.mean_rate(),
                self.stats.failed
            ),
        }
    }
}

/// Owns the context of one run and drives its threads.
pub struct Orchestrator<C: Connector> {
    ctx: RunContext<C>,
    phase: Phase,
}

impl<C: Connector> Orchestrator<C> {
    /// Validate `config` and build the run context.
    pub fn new(config: TestConfig, connector: C, queries: Vec<String>) -> RunResult<Self> {
        config.validate()?;
        Ok(Self {
            ctx: RunContext::new(config, connector, queries),
            phase: Phase::Init,
        })
    }

    /// Shared state of the run.
    pub fn context(&self) -> &RunContext<C> {
        &self.ctx
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run to completion, writing progress lines to `progress`.
    ///
    /// Returns once every thread has been joined. A spawn failure requests
    /// quit, waits for the threads already started and returns the error.
    /// An orchestrator runs once; later calls fail with
    /// [`RunError::AlreadyStarted`].
    pub fn run<W: Write + Send>(&mut self, progress: W) -> RunResult<RunSummary> {
        if self.phase != Phase::Init {
            return Err(RunError::AlreadyStarted { phase: self.phase });
        }
        let ctx = &self.ctx;
        let phase = &mut self.phase;
        let concurrency = ctx.config().concurrency;
        let started = Instant::now();

        info!(target: "sct::run", mode = %ctx.config().test_mode, concurrency, "starting run");
        transition(phase, Phase::Running);

        let windows = thread::scope(|s| -> RunResult<Vec<StatsSnapshot>> {
            let mut workers = Vec::with_capacity(concurrency);
            for thread_id in 0..concurrency {
                let guard = ctx.register_worker();
                let name = format!("sct-worker-{}", thread_id);
                let spawned = thread::Builder::new().name(name.clone()).spawn_scoped(s, move || {
                    let _guard = guard;
                    run_worker(ctx, thread_id);
                });
                match spawned {
                    Ok(handle) => workers.push(handle),
                    Err(source) => {
                        error!(target: "sct::run", thread = %name, error = %source, "spawn failed");
                        ctx.request_quit();
                        return Err(RunError::Spawn { name, source });
                    }
                }
            }

            let quit_on_error = |e: RunError| {
                ctx.request_quit();
                e
            };
            let governor = match ctx.window() {
                Some(window) => Some(
                    spawn(s, "sct-governor", move || {
                        QpsGovernor::new(window, Instant::now()).run(|| ctx.should_quit())
                    })
                    .map_err(quit_on_error)?,
                ),
                None => None,
            };
            let reporter = spawn(s, "sct-reporter", move || {
                if let Err(e) = Reporter::new(ctx, progress).run() {
                    warn!(target: "sct::run", error = %e, "progress output failed");
                }
            })
            .map_err(quit_on_error)?;

            transition(phase, Phase::Draining);
            for handle in workers {
                if handle.join().is_err() {
                    error!(target: "sct::run", "worker thread panicked");
                }
            }
            ctx.request_quit();
            if reporter.join().is_err() {
                error!(target: "sct::run", "reporter thread panicked");
            }
            let windows = match governor.map(|handle| handle.join()) {
                Some(Ok(windows)) => windows,
                Some(Err(_)) => {
                    error!(target: "sct::run", "governor thread panicked");
                    Vec::new()
                }
                None => Vec::new(),
            };
            Ok(windows)
        })?;

        transition(phase, Phase::Done);
        let summary = RunSummary {
            mode: ctx.config().test_mode,
            stats: ctx.stats().snapshot(),
            elapsed: started.elapsed(),
            test_time: ctx.config().test_time,
            workers: concurrency,
            aborted_workers: ctx.aborted_workers(),
            windows,
        };
        info!(target: "sct::run", total = summary.stats.total, failed = summary.stats.failed,
              aborted = summary.aborted_workers, elapsed_ms = summary.elapsed.as_millis() as u64,
              "run finished");
        Ok(summary)
    }
}

fn transition(phase: &mut Phase, next: Phase) {
    debug!(target: "sct::run", from = ?*phase, to = ?next, "phase change");
    *phase = next;
}

fn spawn<'scope, 'env, F, T>(
    s: &'scope thread::Scope<'scope, 'env>,
    name: &str,
    body: F,
) -> RunResult<thread::ScopedJoinHandle<'scope, T>>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn_scoped(s, body)
        .map_err(|source| RunError::Spawn {
            name: name.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sct_client::SimCluster;

    fn sct_config() -> TestConfig {
        TestConfig {
            host_rw: Some("rw".into()),
            port_rw: Some(3306),
            host_ro: Some("ro".into()),
            database: Some("test".into()),
            table_size: 10,
            iterations: 5,
            report_interval: 0,
            seed: Some(1),
            ..TestConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = TestConfig {
            host_ro: None,
            ..sct_config()
        };
        let err = Orchestrator::new(cfg, SimCluster::new(), Vec::new()).err();
        assert!(matches!(err, Some(RunError::Config(_))));
    }

    #[test]
    fn test_phases() {
        let cfg = sct_config();
        let cluster = SimCluster::for_config(&cfg);
        let mut orch = Orchestrator::new(cfg, cluster, Vec::new()).unwrap();
        assert_eq!(orch.phase(), Phase::Init);
        orch.run(std::io::sink()).unwrap();
        assert_eq!(orch.phase(), Phase::Done);
        assert_eq!(orch.context().active_threads(), 0);
    }

    #[test]
    fn test_second_run_rejected() {
        let cfg = sct_config();
        let cluster = SimCluster::for_config(&cfg);
        let mut orch = Orchestrator::new(cfg, cluster.clone(), Vec::new()).unwrap();
        let first = orch.run(std::io::sink()).unwrap();
        assert_eq!(first.stats.total, 5);
        assert!(first.windows.is_empty());
        let opened = cluster.connections_opened();

        let err = orch.run(std::io::sink()).unwrap_err();
        assert!(matches!(err, RunError::AlreadyStarted { phase: Phase::Done }));
        assert_eq!(orch.phase(), Phase::Done);
        assert_eq!(cluster.connections_opened(), opened);
    }

    #[test]
    fn test_summary_lines() {
        let summary = RunSummary {
            mode: TestMode::Consistency,
            stats: StatsSnapshot { total: 5, failed: 1 },
            elapsed: Duration::from_secs(1),
            test_time: 0,
            workers: 1,
            aborted_workers: 0,
            windows: Vec::new(),
        };
        assert_eq!(summary.to_string(), "Test strict consistency cnt: 5, failed cnt: 1");

        let churn = RunSummary {
            mode: TestMode::Churn,
            ..summary.clone()
        };
        assert_eq!(churn.to_string(), "Test connection/disconnect cnt: 5, failed cnt: 1");

        let qps = RunSummary {
            mode: TestMode::ThrottledLoad,
            stats: StatsSnapshot { total: 1000, failed: 3 },
            test_time: 4,
            ..summary
        };
        assert_eq!(qps.to_string(), "mean qps in all time: 250, failed cnt: 3");
    }
}
