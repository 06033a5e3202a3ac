//! Error types for worker and run failures.
//!
//! A `WorkerError` ends one worker early; the run itself continues with the
//! remaining workers. A `RunError` prevents the run from starting (or from
//! spawning all of its threads).

use crate::orchestrator::Phase;
use sct_core::{ConfigError, ConnectError, QueryError};
use thiserror::Error;

/// Fatal failure of one worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Could not open a session
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A statement failed while preparing the worker's tables
    #[error("setup failed, sql: {statement}, {source}")]
    Setup {
        /// Statement that failed
        statement: String,
        /// Error returned by the write node
        source: QueryError,
    },

    /// A statement failed on the write node while updating
    #[error("update failed, sql: {statement}, {source}")]
    Update {
        /// Statement that failed
        statement: String,
        /// Error returned by the write node
        source: QueryError,
    },

    /// The row chosen for update is absent on the write node
    #[error("row {key} is missing from {table} on the write node")]
    MissingRow {
        /// Table that was read
        table: String,
        /// Key that was looked up
        key: u64,
    },
}

/// Result alias for worker operations.
pub type WorkerResult<T> = std::result::Result<T, WorkerError>;

/// Failure to start or run the thread pool.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration did not validate
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The OS refused to create a thread
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        /// Name of the thread that could not be spawned
        name: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The orchestrator has already been run
    #[error("run already started (phase {phase:?})")]
    AlreadyStarted {
        /// Phase the orchestrator was in
        phase: Phase,
    },
}

/// Result alias for run operations.
pub type RunResult<T> = std::result::Result<T, RunError>;
