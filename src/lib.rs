//! mysqlsct - consistency, churn and throughput harness for primary/replica databases
//!
//! Three workloads run against a pair of endpoints (or one endpoint):
//! - `sct`: write on the primary, read back from the replica, count mismatches
//! - `shortct`: open a connection, run a statement list, close it, repeat
//! - `qps`: run a statement list at a fixed statements-per-second rate
//!
//! # Quick Start
//!
//! ```ignore
//! use mysqlsct::{Orchestrator, SimCluster, TestConfig};
//!
//! let config = TestConfig {
//!     host_rw: Some("rw".into()),
//!     port_rw: Some(3306),
//!     host_ro: Some("ro".into()),
//!     database: Some("test".into()),
//!     ..TestConfig::default()
//! };
//! let cluster = SimCluster::for_config(&config);
//! let summary = Orchestrator::new(config, cluster, Vec::new())?.run(std::io::stdout())?;
//! println!("{}", summary);
//! ```
//!
//! The database client is pluggable through [`Connector`]; the in-memory
//! [`SimCluster`] is always available and the MySQL client is behind the
//! `mysql` feature.

pub use sct_core::{
    codes, ConfigError, ConfigResult, ConnectError, ConnectParams, Connector, Endpoint,
    QueryError, Row, RowSet, Session, Statistics, StatsSnapshot, TestConfig, TestMode,
};

pub use sct_client::{NodeRole, SimCluster, SimSession};
#[cfg(feature = "mysql")]
pub use sct_client::{MysqlConnector, MysqlSession};

pub use sct_engine::{
    load_queries, parse_queries, render_queries, Orchestrator, Phase, RunContext, RunError,
    RunResult, RunSummary, WorkerError,
};
