//! Test-execution engine for mysqlsct
//!
//! This crate runs the workload against a [`sct_core::Connector`]:
//! - RunContext: per-run shared state (statistics, iteration budget, quit flag)
//! - Workers: consistency (`sct`), churn (`shortct`) and throttled load (`qps`)
//! - QpsGovernor: per-second pacing of throttled workers
//! - Reporter: periodic snapshot-diff progress lines
//! - Orchestrator: thread pool lifecycle and the final summary
//!
//! The engine never prints the summary itself; callers decide where it goes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod governor;
pub mod orchestrator;
pub mod queries;
pub mod reporter;
pub mod worker;

pub use context::{ActiveGuard, RunContext};
pub use error::{RunError, RunResult, WorkerError, WorkerResult};
pub use governor::{QpsGovernor, QpsWindow};
pub use orchestrator::{Orchestrator, Phase, RunSummary};
pub use queries::{load_queries, parse_queries, render_queries};
pub use reporter::{progress_line, Reporter};
pub use worker::{
    drive, run_worker, ChurnWorker, ConsistencyWorker, ModeWorker, Outcome, ThrottledWorker, Worker,
};
