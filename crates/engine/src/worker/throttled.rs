//! Throttled-load worker (`qps` mode)
//!
//! Runs the statement list like the churn worker but under the QPS governor:
//! a window slot is taken before every statement, and every executed
//! statement is counted in both the run statistics and the governor window.
//! A refused slot ends the iteration, even in the middle of the list.

use super::{Outcome, Worker};
use crate::context::RunContext;
use crate::error::WorkerResult;
use sct_core::{Connector, Session};
use std::time::Duration;
use tracing::warn;

/// Sleep between checks of the pause flag.
const PAUSE_POLL: Duration = Duration::from_micros(50);

/// Worker for the throughput test.
pub struct ThrottledWorker<'a, C: Connector> {
    ctx: &'a RunContext<C>,
    thread_id: usize,
}

impl<'a, C: Connector> ThrottledWorker<'a, C> {
    /// Worker `thread_id` of the run.
    pub fn new(ctx: &'a RunContext<C>, thread_id: usize) -> Self {
        Self { ctx, thread_id }
    }

    fn is_paused(&self) -> bool {
        self.ctx.window().is_some_and(|w| w.is_paused())
    }

    fn acquire(&self) -> bool {
        self.ctx.window().map_or(true, |w| w.try_acquire())
    }

    /// Count one statement in the run statistics and the window.
    fn record(&self, passed: bool) {
        self.ctx.stats().record(passed);
        if let Some(window) = self.ctx.window() {
            window.record(passed);
        }
    }

    /// Wait out a pause; `false` if the run ended meanwhile.
    fn wait_for_budget(&self) -> bool {
        while self.is_paused() {
            if self.ctx.should_quit() || self.ctx.time_exhausted() {
                return false;
            }
            std::thread::sleep(PAUSE_POLL);
        }
        true
    }
}

impl<C: Connector> Worker for ThrottledWorker<'_, C> {
    fn prepare(&mut self) -> WorkerResult<()> {
        Ok(())
    }

    fn run_iteration(&mut self) -> WorkerResult<Outcome> {
        if !self.wait_for_budget() {
            return Ok(Outcome::Inconclusive);
        }

        let config = self.ctx.config();
        let params = config.connect_params(config.single_endpoint().unwrap_or_default());
        let mut session = match self.ctx.connector().connect(&params) {
            Ok(session) => session,
            Err(e) => {
                warn!(target: "sct::qps", thread_id = self.thread_id, error = %e, "connect failed");
                // No statement ran, so the window is left alone.
                self.ctx.stats().record(false);
                return Ok(Outcome::Failed);
            }
        };

        for query in self.ctx.queries() {
            if !self.acquire() {
                return Ok(Outcome::Inconclusive);
            }
            match session.execute(query) {
                Ok(_) => self.record(true),
                Err(e) => {
                    warn!(target: "sct::qps", thread_id = self.thread_id, sql = %query,
                          errno = e.code, errmsg = %e.message, "statement failed");
                    self.record(false);
                    return Ok(Outcome::Failed);
                }
            }
        }
        Ok(Outcome::Passed)
    }

    fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::QpsGovernor;
    use sct_client::SimCluster;
    use sct_core::{TestConfig, TestMode};
    use std::time::Instant;

    fn context(target: u64, queries: &[&str]) -> (RunContext<SimCluster>, SimCluster) {
        let cfg = TestConfig {
            test_mode: TestMode::ThrottledLoad,
            host: Some("proxy".into()),
            port: Some(6033),
            database: Some("test".into()),
            target_qps: target,
            test_time: 60,
            ..TestConfig::default()
        };
        let cluster = SimCluster::for_config(&cfg);
        let queries = queries.iter().map(|q| q.to_string()).collect();
        (RunContext::new(cfg, cluster.clone(), queries), cluster)
    }

    #[test]
    fn test_statements_counted_in_stats_and_window() {
        let (ctx, _) = context(100, &["select 1", "select 2", "select 3"]);
        let mut w = ThrottledWorker::new(&ctx, 0);
        assert_eq!(w.run_iteration().unwrap(), Outcome::Passed);
        assert_eq!(ctx.stats().total(), 3);
        assert_eq!(ctx.window().unwrap().snapshot().total, 3);
    }

    #[test]
    fn test_failed_statement_counts_total_and_failed() {
        let (ctx, _) = context(100, &["select 1", "update nope set a = 1 where b = 2"]);
        let mut w = ThrottledWorker::new(&ctx, 0);
        assert_eq!(w.run_iteration().unwrap(), Outcome::Failed);
        let snap = ctx.stats().snapshot();
        assert_eq!((snap.total, snap.failed), (2, 1));
    }

    #[test]
    fn test_spent_budget_interrupts_batch() {
        let (ctx, cluster) = context(2, &["select 1", "select 2", "select 3", "select 4"]);
        let mut w = ThrottledWorker::new(&ctx, 0);

        assert_eq!(w.run_iteration().unwrap(), Outcome::Inconclusive);
        assert_eq!(cluster.statements_executed(), 2);
        assert_eq!(ctx.stats().total(), 2);
        assert!(ctx.window().unwrap().is_paused());
    }

    #[test]
    fn test_paused_worker_waits_until_quit() {
        let (ctx, cluster) = context(1, &["select 1"]);
        let window = ctx.window().unwrap();
        assert!(window.try_acquire());
        window.record(true);

        ctx.request_quit();
        let mut w = ThrottledWorker::new(&ctx, 0);
        assert_eq!(w.run_iteration().unwrap(), Outcome::Inconclusive);
        assert_eq!(cluster.statements_executed(), 0);
        assert_eq!(cluster.connections_opened(), 0);
    }

    #[test]
    fn test_next_window_resumes_batch() {
        let (ctx, cluster) = context(3, &["select 1", "select 2"]);
        let window = ctx.window().unwrap();
        let start = Instant::now();
        let mut gov = QpsGovernor::new(window, start);
        let mut w = ThrottledWorker::new(&ctx, 0);

        assert_eq!(w.run_iteration().unwrap(), Outcome::Passed);
        assert_eq!(w.run_iteration().unwrap(), Outcome::Inconclusive);
        assert_eq!(cluster.statements_executed(), 3);

        let closed = gov.tick(start + Duration::from_secs(1)).unwrap();
        assert_eq!(closed.passed(), 3);
        assert_eq!(w.run_iteration().unwrap(), Outcome::Passed);
        assert_eq!(window.snapshot().total, 2);
    }

    #[test]
    fn test_connect_failure_not_counted_in_window() {
        let (ctx, cluster) = context(5, &["select 1"]);
        cluster.set_reachable(&sct_core::Endpoint::new("proxy", 6033), false);
        let mut w = ThrottledWorker::new(&ctx, 0);
        assert_eq!(w.run_iteration().unwrap(), Outcome::Failed);
        assert_eq!(ctx.stats().failed(), 1);
        assert_eq!(ctx.window().unwrap().snapshot().total, 0);
    }
}
