//! Error types shared by every mysqlsct crate
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//! Query and connect failures carry the server's numeric error code because the
//! consistency protocol classifies failures by code (transient vs definite).

use crate::mode::TestMode;
use crate::session::Endpoint;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration handling
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A statement failed on an open session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("errno: {code}, errmsg: {message}")]
pub struct QueryError {
    /// Numeric error code reported by the server or the client library
    pub code: u32,
    /// Human-readable message
    pub message: String,
}

impl QueryError {
    /// Build a query error from a code and message.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Opening a session failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("connect to {endpoint} error {code}, {message}")]
pub struct ConnectError {
    /// Endpoint the connection was attempted against
    pub endpoint: Endpoint,
    /// Numeric error code
    pub code: u32,
    /// Human-readable message
    pub message: String,
}

impl ConnectError {
    /// Build a connect error for `endpoint`.
    pub fn new(endpoint: Endpoint, code: u32, message: impl Into<String>) -> Self {
        Self {
            endpoint,
            code,
            message: message.into(),
        }
    }
}

/// Configuration could not be loaded or failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field required by the selected mode is absent
    #[error("miss {field} (required by {mode} mode)")]
    Missing {
        /// Name of the missing option
        field: &'static str,
        /// Mode that requires it
        mode: TestMode,
    },

    /// A field holds a value outside its accepted domain
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending option
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The test mode string is not one of the supported modes
    #[error("wrong test mode: {0}, only sct, shortct and qps are supported")]
    UnknownMode(String),

    /// The configuration file could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::TestConfig`]
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path of the file
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Several validation failures, reported together
    #[error("{}", join_errors(.0))]
    Rejected(Vec<ConfigError>),
}

impl ConfigError {
    /// Build an `Invalid` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Flatten into the list of individual problems.
    pub fn problems(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Rejected(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
