//! Run configuration
//!
//! A `TestConfig` can be read from a TOML file, overridden field by field from
//! the command line, and is then validated once. After validation it is shared
//! read-only by every thread of the run.
//!
//! # Example
//!
//! ```toml
//! test_mode = "sct"
//! host_rw = "10.0.0.1"
//! port_rw = 3306
//! host_ro = "10.0.0.2"
//! database = "sbtest"
//! user = "root"
//! table_size = 1000
//! iterations = 100000
//! concurrency = 8
//! ```

use crate::codes::DEFAULT_TRANSIENT_CODES;
use crate::error::{ConfigError, ConfigResult};
use crate::mode::TestMode;
use crate::session::{ConnectParams, Endpoint};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default statement-list file for churn and throughput modes.
pub const DEFAULT_QUERY_FILE: &str = "short_connection_querys.txt";

/// Default prefix of the per-worker table names.
pub const DEFAULT_TABLE_PREFIX: &str = "sct";

/// Prefix prepended to the primary table name to name the secondary-index table.
pub const SECONDARY_TABLE_PREFIX: &str = "sec_index";

/// Full configuration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    /// Workload to run
    pub test_mode: TestMode,

    /// Write (read-write) node host, `sct` mode
    pub host_rw: Option<String>,
    /// Write node port
    pub port_rw: Option<u16>,
    /// Read (read-only) node host, `sct` mode
    pub host_ro: Option<String>,
    /// Read node port; falls back to `port_rw`
    pub port_ro: Option<u16>,
    /// Single endpoint host, `shortct` and `qps` modes
    pub host: Option<String>,
    /// Single endpoint port
    pub port: Option<u16>,

    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
    /// Database (schema) holding the test tables
    pub database: Option<String>,
    /// Connect timeout in seconds
    pub connect_timeout: u64,

    /// Prefix of per-worker table names
    pub table_name_prefix: String,
    /// Rows per table
    pub table_size: u64,
    /// Number of tables to test (accepted for compatibility, one pair per worker)
    pub table_cnt: u32,

    /// Total iterations shared by all workers
    pub iterations: u64,
    /// Wall-clock bound in seconds; 0 means unbounded
    pub test_time: u64,

    /// Delay between write and verify, microseconds
    pub sc_gap_us: u64,
    /// Seconds to sleep after a consistency violation
    pub sleep_after_fail: u64,
    /// Seconds between progress lines; 0 disables them
    pub report_interval: u64,

    /// Worker threads
    pub concurrency: usize,

    /// Reopen connections on every iteration
    pub short_connection: bool,
    /// Reuse existing tables instead of recreating them
    pub skip_prepare: bool,
    /// Read every inserted row back from the read node while preparing
    pub select_after_insert: bool,
    /// Log every violation with full diagnostics
    pub detail_log: bool,

    /// Target statements per second, `qps` mode
    pub target_qps: u64,
    /// Statement list for `shortct` and `qps` modes
    pub query_file: PathBuf,

    /// Error codes classified as "replica temporarily unavailable"
    pub transient_error_codes: Vec<u32>,
    /// Base RNG seed; workers add their thread id
    pub seed: Option<u64>,
    /// Database client (`mysql` or `sim`); the front end picks one if unset
    pub backend: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            test_mode: TestMode::Consistency,
            host_rw: None,
            port_rw: None,
            host_ro: None,
            port_ro: None,
            host: None,
            port: None,
            user: String::new(),
            password: String::new(),
            database: None,
            connect_timeout: 5,
            table_name_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            table_size: 1000,
            table_cnt: 1,
            iterations: 100_000,
            test_time: 0,
            sc_gap_us: 0,
            sleep_after_fail: 0,
            report_interval: 1,
            concurrency: 1,
            short_connection: false,
            skip_prepare: false,
            select_after_insert: false,
            detail_log: false,
            target_qps: 0,
            query_file: PathBuf::from(DEFAULT_QUERY_FILE),
            transient_error_codes: DEFAULT_TRANSIENT_CODES.to_vec(),
            seed: None,
            backend: None,
        }
    }
}

impl TestConfig {
    /// Read and parse a TOML configuration file.
    ///
    /// Fields absent from the file keep their defaults. The result is not
    /// validated; call [`TestConfig::validate`] after applying overrides.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check that the configuration is complete for its mode.
    ///
    /// Every problem is collected; a single problem is returned as-is and
    /// several are wrapped in [`ConfigError::Rejected`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mode = self.test_mode;
        let mut problems = Vec::new();
        let mut require = |present: bool, field: &'static str| {
            if !present {
                problems.push(ConfigError::Missing { field, mode });
            }
        };

        match mode {
            TestMode::Consistency => {
                require(non_empty(&self.host_rw), "host_rw");
                require(non_empty(&self.host_ro), "host_ro");
                require(self.port_rw.is_some(), "port_rw");
            }
            TestMode::Churn | TestMode::ThrottledLoad => {
                require(non_empty(&self.host), "host");
                require(self.port.is_some(), "port");
            }
        }
        require(non_empty(&self.database), "database");
        if mode == TestMode::ThrottledLoad {
            require(self.target_qps > 0, "target_qps");
            require(self.test_time > 0, "test_time");
        }

        if self.concurrency == 0 {
            problems.push(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if mode == TestMode::Consistency && self.table_size == 0 {
            problems.push(ConfigError::invalid("table_size", "must be at least 1"));
        }
        if self.table_cnt == 0 {
            problems.push(ConfigError::invalid("table_cnt", "must be at least 1"));
        }
        let prefix_ok = !self.table_name_prefix.is_empty()
            && self
                .table_name_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !prefix_ok {
            problems.push(ConfigError::invalid(
                "table_name_prefix",
                format!(
                    "'{}' must be non-empty and contain only [A-Za-z0-9_]",
                    self.table_name_prefix
                ),
            ));
        }

        match problems.len() {
            0 => Ok(()),
            1 => Err(problems.remove(0)),
            _ => Err(ConfigError::Rejected(problems)),
        }
    }

    /// The write node, when configured.
    pub fn write_endpoint(&self) -> Option<Endpoint> {
        endpoint(&self.host_rw, self.port_rw)
    }

    /// The read node, when configured. Uses `port_rw` if `port_ro` is unset.
    pub fn read_endpoint(&self) -> Option<Endpoint> {
        endpoint(&self.host_ro, self.port_ro.or(self.port_rw))
    }

    /// The single endpoint used by churn and throughput modes.
    pub fn single_endpoint(&self) -> Option<Endpoint> {
        endpoint(&self.host, self.port)
    }

    /// Connection parameters for `endpoint` using this run's credentials.
    pub fn connect_params(&self, endpoint: Endpoint) -> ConnectParams {
        ConnectParams {
            endpoint,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone().unwrap_or_default(),
            timeout: Duration::from_secs(self.connect_timeout),
        }
    }

    /// Shared iteration bound; `None` for time-bounded modes.
    pub fn iteration_limit(&self) -> Option<u64> {
        if self.test_mode.is_time_bounded() {
            None
        } else {
            Some(self.iterations)
        }
    }

    /// Wall-clock bound, if any.
    pub fn test_time_limit(&self) -> Option<Duration> {
        (self.test_time > 0).then(|| Duration::from_secs(self.test_time))
    }

    /// Delay between the write and the verify phase.
    pub fn sc_gap(&self) -> Option<Duration> {
        (self.sc_gap_us > 0).then(|| Duration::from_micros(self.sc_gap_us))
    }

    /// Operator sleep after a consistency violation.
    pub fn fail_pause(&self) -> Option<Duration> {
        (self.sleep_after_fail > 0).then(|| Duration::from_secs(self.sleep_after_fail))
    }

    /// Whether `code` marks a replica as temporarily unavailable.
    pub fn is_transient(&self, code: u32) -> bool {
        self.transient_error_codes.contains(&code)
    }

    /// Primary table name owned by worker `thread_id`.
    pub fn primary_table(&self, thread_id: usize) -> String {
        format!("{}{}", self.table_name_prefix, thread_id)
    }

    /// Secondary-index table name owned by worker `thread_id`.
    pub fn secondary_table(&self, thread_id: usize) -> String {
        format!("{}{}", SECONDARY_TABLE_PREFIX, self.primary_table(thread_id))
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn endpoint(host: &Option<String>, port: Option<u16>) -> Option<Endpoint> {
    match (host, port) {
        (Some(host), Some(port)) => Some(Endpoint::new(host.clone(), port)),
        _ => None,
    }
}

fn show<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for TestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input parameters: ")?;
        writeln!(f, "test-mode: {}", self.test_mode)?;
        writeln!(f, "backend: {}", show(&self.backend))?;
        match self.test_mode {
            TestMode::Consistency => {
                writeln!(f, "host-rw: {}", show(&self.host_rw))?;
                writeln!(f, "port-rw: {}", show(&self.port_rw))?;
                writeln!(f, "host-ro: {}", show(&self.host_ro))?;
                writeln!(f, "port-ro: {}", show(&self.port_ro.or(self.port_rw)))?;
            }
            TestMode::Churn | TestMode::ThrottledLoad => {
                writeln!(f, "host: {}", show(&self.host))?;
                writeln!(f, "port: {}", show(&self.port))?;
                writeln!(f, "query-file: {}", self.query_file.display())?;
            }
        }
        writeln!(f, "database: {}", show(&self.database))?;
        writeln!(f, "user: {}", self.user)?;
        let masked = if self.password.is_empty() { "" } else { "******" };
        writeln!(f, "password: {}", masked)?;
        writeln!(f, "iterations: {}", self.iterations)?;
        writeln!(f, "test-time: {}", self.test_time)?;
        if self.test_mode == TestMode::Consistency {
            writeln!(f, "table-prefix: {}", self.table_name_prefix)?;
            writeln!(f, "table-cnt: {}", self.table_cnt)?;
            writeln!(f, "table-size: {}", self.table_size)?;
            writeln!(f, "sc-gap-us: {}", self.sc_gap_us)?;
            writeln!(f, "skip-prepare: {}", self.skip_prepare)?;
            writeln!(f, "test-after-insert: {}", self.select_after_insert)?;
            writeln!(f, "sleep-after-fail: {}", self.sleep_after_fail)?;
        }
        if self.test_mode == TestMode::ThrottledLoad {
            writeln!(f, "qps: {}", self.target_qps)?;
        }
        writeln!(f, "report-interval: {}", self.report_interval)?;
        writeln!(f, "detail-log: {}", self.detail_log)?;
        writeln!(f, "concurrency: {}", self.concurrency)?;
        writeln!(f, "short-connection: {}", self.short_connection)?;
        writeln!(f, "transient-errors: {:?}", self.transient_error_codes)?;
        write!(f, "###########################################")
    }
}
