//! Connection-churn worker (`shortct` mode)
//!
//! Every iteration opens a fresh session to the single endpoint, runs the
//! statement list in order and drops the session. The first failing statement
//! ends the iteration as failed.

use super::{Outcome, Worker};
use crate::context::RunContext;
use crate::error::WorkerResult;
use sct_core::{Connector, QueryError, Session};
use tracing::warn;

/// Worker for the connect/disconnect test.
pub struct ChurnWorker<'a, C: Connector> {
    ctx: &'a RunContext<C>,
    thread_id: usize,
}

impl<'a, C: Connector> ChurnWorker<'a, C> {
    /// Worker `thread_id` of the run.
    pub fn new(ctx: &'a RunContext<C>, thread_id: usize) -> Self {
        Self { ctx, thread_id }
    }
}

impl<C: Connector> Worker for ChurnWorker<'_, C> {
    fn prepare(&mut self) -> WorkerResult<()> {
        Ok(())
    }

    fn run_iteration(&mut self) -> WorkerResult<Outcome> {
        let config = self.ctx.config();
        let params = config.connect_params(config.single_endpoint().unwrap_or_default());

        let outcome = match self.ctx.connector().connect(&params) {
            Ok(mut session) => match execute_all(&mut session, self.ctx.queries()) {
                Ok(()) => Outcome::Passed,
                Err((sql, e)) => {
                    warn!(target: "sct::churn", thread_id = self.thread_id, sql = %sql,
                          errno = e.code, errmsg = %e.message, "statement failed");
                    Outcome::Failed
                }
            },
            Err(e) => {
                warn!(target: "sct::churn", thread_id = self.thread_id, error = %e, "connect failed");
                Outcome::Failed
            }
        };

        self.ctx.stats().record(outcome == Outcome::Passed);
        Ok(outcome)
    }

    fn cleanup(&mut self) {}
}

/// Execute `queries` in order, stopping at the first error.
fn execute_all<'q, S: Session>(
    session: &mut S,
    queries: &'q [String],
) -> Result<(), (&'q str, QueryError)> {
    for query in queries {
        session.execute(query).map_err(|e| (query.as_str(), e))?;
    }
    Ok(())
}
