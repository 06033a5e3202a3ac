//! Periodic progress reporter
//!
//! Every `report_interval` seconds the reporter snapshots the run statistics,
//! prints the per-second rate of the difference to the previous snapshot and
//! keeps the new snapshot as the baseline. It stops once no worker is active.
//! For time-bounded runs it also requests the cooperative quit when
//! `test_time` has elapsed.

use crate::context::RunContext;
use sct_core::{Connector, StatsSnapshot, TestMode};
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

/// Format one progress line.
///
/// `delta` is the counter difference over `interval_secs`. Churn and
/// throughput lines also carry the number of active workers.
pub fn progress_line(mode: TestMode, delta: StatsSnapshot, interval_secs: u64, active: usize) -> String {
    let (rate, failed_rate) = delta.per_second(interval_secs);
    let (label, failed_label) = mode.rate_labels();
    match mode {
        TestMode::Consistency => format!("{}: {}, {}: {}", label, rate, failed_label, failed_rate),
        TestMode::Churn | TestMode::ThrottledLoad => format!(
            "{}: {}, {}: {}, active threads : {}",
            label, rate, failed_label, failed_rate, active
        ),
    }
}

/// Snapshot-diff reporter writing progress lines to `out`.
pub struct Reporter<'a, C: Connector, W: Write> {
    ctx: &'a RunContext<C>,
    out: W,
    previous: StatsSnapshot,
}

impl<'a, C: Connector, W: Write> Reporter<'a, C, W> {
    /// Reporter whose first interval starts now.
    pub fn new(ctx: &'a RunContext<C>, out: W) -> Self {
        Self {
            ctx,
            out,
            previous: ctx.stats().snapshot(),
        }
    }

    /// Report until every worker has finished; returns the number of lines
    /// written. With `report_interval = 0` nothing is printed.
    pub fn run(mut self) -> io::Result<u64> {
        let interval = self.ctx.config().report_interval;
        if interval == 0 {
            return Ok(0);
        }

        let mut lines = 0;
        while self.ctx.active_threads() > 0 {
            if !self.wait(Duration::from_secs(interval)) {
                break;
            }
            let now = self.ctx.stats().snapshot();
            let line = progress_line(
                self.ctx.config().test_mode,
                now.since(&self.previous),
                interval,
                self.ctx.active_threads(),
            );
            writeln!(self.out, "{}", line)?;
            self.out.flush()?;
            self.previous = now;
            lines += 1;

            if self.ctx.time_exhausted() {
                debug!(target: "sct::run", elapsed_ms = self.ctx.elapsed().as_millis() as u64,
                       "test time elapsed, requesting quit");
                self.ctx.request_quit();
                break;
            }
        }
        Ok(lines)
    }

    /// Sleep for one interval; `false` if all workers finished or a quit was
    /// requested in the meantime.
    fn wait(&self, interval: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        while waited < interval {
            if self.ctx.active_threads() == 0 || self.ctx.should_quit() {
                return false;
            }
            let step = SLICE.min(interval - waited);
            std::thread::sleep(step);
            waited += step;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sct_client::SimCluster;
    use sct_core::TestConfig;

    #[test]
    fn test_consistency_line() {
        let delta = StatsSnapshot { total: 250, failed: 4 };
        assert_eq!(
            progress_line(TestMode::Consistency, delta, 2, 8),
            "Strict consistency tps: 125, failed tps: 2"
        );
    }

    #[test]
    fn test_churn_and_qps_lines_carry_active_threads() {
        let delta = StatsSnapshot { total: 30, failed: 0 };
        assert_eq!(
            progress_line(TestMode::Churn, delta, 1, 3),
            "cd(connect/disconnect)ps: 30, failed cdps: 0, active threads : 3"
        );
        assert_eq!(
            progress_line(TestMode::ThrottledLoad, delta, 1, 2),
            "qps: 30, failed qps: 0, active threads : 2"
        );
    }

    #[test]
    fn test_zero_interval_prints_nothing() {
        let cfg = TestConfig {
            report_interval: 0,
            ..TestConfig::default()
        };
        let ctx = RunContext::new(cfg, SimCluster::new(), Vec::new());
        let _guard = ctx.register_worker();
        let mut out = Vec::new();
        assert_eq!(Reporter::new(&ctx, &mut out).run().unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_exits_when_no_worker_is_active() {
        let ctx = RunContext::new(TestConfig::default(), SimCluster::new(), Vec::new());
        let mut out = Vec::new();
        assert_eq!(Reporter::new(&ctx, &mut out).run().unwrap(), 0);
    }

    #[test]
    fn test_reports_delta_and_requests_quit_after_test_time() {
        let cfg = TestConfig {
            test_mode: TestMode::ThrottledLoad,
            target_qps: 10,
            test_time: 1,
            ..TestConfig::default()
        };
        let ctx = RunContext::new(cfg, SimCluster::new(), Vec::new());
        let _guard = ctx.register_worker();
        for _ in 0..5 {
            ctx.stats().record(true);
        }

        let mut out = Vec::new();
        let reporter = Reporter::new(&ctx, &mut out);
        // Only counts recorded after the baseline show up in the first line.
        for _ in 0..3 {
            ctx.stats().record(true);
        }
        ctx.stats().record(false);
        assert_eq!(reporter.run().unwrap(), 1);

        assert!(ctx.should_quit());
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "qps: 4, failed qps: 1, active threads : 1\n");
    }
}
