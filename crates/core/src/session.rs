//! Database client capability consumed by the harness
//!
//! The harness does not speak any wire protocol itself. A backend implements
//! [`Connector`] (open a session) and [`Session`] (execute a statement and
//! return its rows). Closing a session is dropping it, so every exit path of a
//! worker releases its connections.

use crate::error::{ConnectError, QueryError};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// A `host:port` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything needed to open one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Node to connect to
    pub endpoint: Endpoint,
    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
    /// Default database (schema)
    pub database: String,
    /// Connect timeout
    pub timeout: Duration,
}

/// One result row, columns in textual form (`None` is SQL NULL).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    columns: Vec<Option<String>>,
}

impl Row {
    /// Build a row from its columns.
    pub fn new(columns: Vec<Option<String>>) -> Self {
        Self { columns }
    }

    /// Build a row of non-NULL unsigned integers.
    pub fn from_u64s(values: &[u64]) -> Self {
        Self {
            columns: values.iter().map(|v| Some(v.to_string())).collect(),
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column `idx` as text; `None` for NULL or out of range.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.columns.get(idx).and_then(|c| c.as_deref())
    }

    /// Column `idx` parsed as an unsigned integer.
    pub fn get_u64(&self, idx: usize) -> Option<u64> {
        self.get(idx).and_then(|s| s.trim().parse().ok())
    }
}

/// Rows returned by one statement, consumed with [`RowSet::fetch_row`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSet {
    rows: VecDeque<Row>,
    affected_rows: u64,
}

impl RowSet {
    /// Result of a statement that returns no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Result of a data-changing statement.
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            rows: VecDeque::new(),
            affected_rows,
        }
    }

    /// Result of a query.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            affected_rows: 0,
        }
    }

    /// Take the next row, if any.
    pub fn fetch_row(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Rows changed by the statement.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }
}

/// An open connection to one node.
///
/// Dropping the session closes it.
pub trait Session: Send {
    /// Execute one statement and buffer its full result.
    fn execute(&mut self, statement: &str) -> Result<RowSet, QueryError>;
}

/// Opens sessions. Shared by every worker of a run.
pub trait Connector: Send + Sync {
    /// Session type produced by this connector
    type Session: Session;

    /// Open a session to `params.endpoint`.
    fn connect(&self, params: &ConnectParams) -> Result<Self::Session, ConnectError>;
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn execute(&mut self, statement: &str) -> Result<RowSet, QueryError> {
        (**self).execute(statement)
    }
}
