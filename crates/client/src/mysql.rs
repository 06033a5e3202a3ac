//! MySQL protocol backend
//!
//! Thin adapter over the `mysql` crate. Every statement runs through the text
//! protocol and its result is buffered into a [`RowSet`]. Driver failures are
//! folded onto client error codes so the engine can classify them:
//! server errors keep their own code, I/O failures on an open session become
//! 2013 (lost connection), and failures while connecting become 2003.

use ::mysql::prelude::Queryable;
use ::mysql::{Conn, DriverError, Error as DriverFailure, OptsBuilder, Value};
use sct_core::codes::{CR_CONN_HOST_ERROR, CR_SERVER_LOST, CR_UNKNOWN_ERROR};
use sct_core::{ConnectError, ConnectParams, Connector, QueryError, Row, RowSet, Session};
use tracing::trace;

/// Opens [`MysqlSession`]s.
#[derive(Debug, Clone, Default)]
pub struct MysqlConnector;

impl MysqlConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for MysqlConnector {
    type Session = MysqlSession;

    fn connect(&self, params: &ConnectParams) -> Result<MysqlSession, ConnectError> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(params.endpoint.host.clone()))
            .tcp_port(params.endpoint.port)
            .user(Some(params.user.clone()))
            .pass(Some(params.password.clone()))
            .db_name(Some(params.database.clone()))
            .tcp_connect_timeout(Some(params.timeout));

        let conn = Conn::new(opts).map_err(|e| {
            let (code, message) = classify(e, CR_CONN_HOST_ERROR);
            ConnectError::new(params.endpoint.clone(), code, message)
        })?;
        trace!(target: "sct::client", endpoint = %params.endpoint, "connected");
        Ok(MysqlSession { conn })
    }
}

/// One open MySQL connection. Dropping it closes the connection.
pub struct MysqlSession {
    conn: Conn,
}

impl Session for MysqlSession {
    fn execute(&mut self, statement: &str) -> Result<RowSet, QueryError> {
        let to_query_error = |e| {
            let (code, message) = classify(e, CR_SERVER_LOST);
            QueryError::new(code, message)
        };

        let mut result = self.conn.query_iter(statement).map_err(to_query_error)?;
        let affected = result.affected_rows();
        let mut rows = Vec::new();
        for row in result.by_ref() {
            let row = row.map_err(to_query_error)?;
            let values = ::mysql::Row::unwrap(row);
            rows.push(Row::new(values.into_iter().map(render).collect()));
        }

        if rows.is_empty() {
            Ok(RowSet::affected(affected))
        } else {
            Ok(RowSet::from_rows(rows))
        }
    }
}

/// Map a driver error onto `(code, message)`; `io_code` is used for
/// transport failures.
fn classify(err: DriverFailure, io_code: u32) -> (u32, String) {
    match err {
        DriverFailure::MySqlError(e) => (u32::from(e.code), e.message),
        DriverFailure::IoError(e) => (io_code, e.to_string()),
        DriverFailure::DriverError(DriverError::ConnectTimeout) => {
            (CR_CONN_HOST_ERROR, "connect timeout".to_string())
        }
        other => (CR_UNKNOWN_ERROR, other.to_string()),
    }
}

fn render(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Double(v) => Some(v.to_string()),
        other => Some(other.as_sql(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_maps_to_given_code() {
        let err = DriverFailure::IoError(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(classify(err, CR_SERVER_LOST).0, CR_SERVER_LOST);
    }

    #[test]
    fn test_connect_timeout_is_host_error() {
        let err = DriverFailure::DriverError(DriverError::ConnectTimeout);
        assert_eq!(classify(err, CR_SERVER_LOST).0, CR_CONN_HOST_ERROR);
    }

    #[test]
    fn test_render_values() {
        assert_eq!(render(Value::NULL), None);
        assert_eq!(render(Value::Bytes(b"17".to_vec())), Some("17".to_string()));
        assert_eq!(render(Value::UInt(5)), Some("5".to_string()));
        assert_eq!(render(Value::Int(-3)), Some("-3".to_string()));
    }
}
