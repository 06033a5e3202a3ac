//! Numeric error codes understood by the harness.
//!
//! Client-side codes (2xxx) come from the client library; server codes (1xxx)
//! are what a MySQL-compatible server returns. Backends map their native
//! failures onto these so classification stays backend independent.

/// MySQL server has gone away
pub const CR_SERVER_GONE_ERROR: u32 = 2006;

/// Lost connection to MySQL server during query
pub const CR_SERVER_LOST: u32 = 2013;

/// Can't connect to server on host
pub const CR_CONN_HOST_ERROR: u32 = 2003;

/// Unknown client-side failure
pub const CR_UNKNOWN_ERROR: u32 = 2000;

/// Table already exists
pub const ER_TABLE_EXISTS_ERROR: u32 = 1050;

/// Unknown table (drop of a missing table)
pub const ER_BAD_TABLE_ERROR: u32 = 1051;

/// Unknown column
pub const ER_BAD_FIELD_ERROR: u32 = 1054;

/// Duplicate entry for a unique key
pub const ER_DUP_ENTRY: u32 = 1062;

/// SQL syntax error
pub const ER_PARSE_ERROR: u32 = 1064;

/// Query was empty
pub const ER_EMPTY_QUERY: u32 = 1065;

/// Column count doesn't match value count
pub const ER_WRONG_VALUE_COUNT_ON_ROW: u32 = 1136;

/// Table doesn't exist
pub const ER_NO_SUCH_TABLE: u32 = 1146;

/// Default set of codes treated as "replica temporarily unavailable".
pub const DEFAULT_TRANSIENT_CODES: [u32; 2] = [CR_SERVER_GONE_ERROR, CR_SERVER_LOST];

/// The server is running with --read-only
pub const ER_OPTION_PREVENTS_STATEMENT: u32 = 1290;
