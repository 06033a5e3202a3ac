//! Core types and traits for mysqlsct
//!
//! This crate defines the foundational types used throughout the harness:
//! - Statistics: lock-free pass/fail counters and their snapshots
//! - TestConfig: the validated, read-only run configuration
//! - TestMode: which workload a run executes
//! - Session traits: the database client capability (Connector, Session, RowSet)
//! - Error: configuration, connect and query error types
//! - codes: numeric error codes used to classify failures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codes;
pub mod config;
pub mod error;
pub mod mode;
pub mod session;
pub mod stats;

pub use config::{TestConfig, DEFAULT_QUERY_FILE, DEFAULT_TABLE_PREFIX, SECONDARY_TABLE_PREFIX};
pub use error::{ConfigError, ConfigResult, ConnectError, QueryError};
pub use mode::TestMode;
pub use session::{ConnectParams, Connector, Endpoint, Row, RowSet, Session};
pub use stats::{Statistics, StatsSnapshot};
