//! Turn parsed arguments into a validated `TestConfig`.
//!
//! Order of precedence: built-in defaults, then the `--config` file, then
//! individual flags.

use clap::ArgMatches;
use sct_core::{ConfigError, ConfigResult, TestConfig, TestMode};
use std::path::PathBuf;

/// Database backend selected with `--backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-memory primary/replica simulation
    Sim,
    /// Real MySQL server
    #[cfg(feature = "mysql")]
    Mysql,
}

impl Backend {
    /// Name used on the command line and in the config file.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Sim => "sim",
            #[cfg(feature = "mysql")]
            Backend::Mysql => "mysql",
        }
    }
}

/// Backend selected by `config.backend`.
///
/// Without a selection the real client is used. A binary built without one
/// refuses to guess, so a run never silently targets the simulator.
pub fn backend(config: &TestConfig) -> ConfigResult<Backend> {
    match config.backend.as_deref() {
        Some("sim") => Ok(Backend::Sim),
        #[cfg(feature = "mysql")]
        Some("mysql") | None => Ok(Backend::Mysql),
        Some(other) => Err(ConfigError::invalid(
            "backend",
            format!("'{}' is not compiled into this binary", other),
        )),
        #[cfg(not(feature = "mysql"))]
        None => Err(ConfigError::invalid(
            "backend",
            "no database client compiled in; rebuild with --features mysql or pass --backend sim",
        )),
    }
}

/// Load, override and validate the configuration, and resolve the backend.
pub fn load_config(matches: &ArgMatches) -> ConfigResult<(TestConfig, Backend)> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => TestConfig::from_file(path)?,
        None => TestConfig::default(),
    };
    apply_overrides(&mut config, matches)?;
    config.validate()?;
    let backend = backend(&config)?;
    config.backend = Some(backend.name().to_string());
    Ok((config, backend))
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn copied<T: Copy + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    matches.get_one::<T>(id).copied()
}

/// Apply every flag present on the command line to `config`.
pub fn apply_overrides(config: &mut TestConfig, matches: &ArgMatches) -> ConfigResult<()> {
    if let Some(mode) = string(matches, "test-mode") {
        config.test_mode = mode.parse::<TestMode>()?;
    }

    if let Some(v) = string(matches, "host-rw") {
        config.host_rw = Some(v);
    }
    if let Some(v) = copied(matches, "port-rw") {
        config.port_rw = Some(v);
    }
    if let Some(v) = string(matches, "host-ro") {
        config.host_ro = Some(v);
    }
    if let Some(v) = copied(matches, "port-ro") {
        config.port_ro = Some(v);
    }
    if let Some(v) = string(matches, "host") {
        config.host = Some(v);
    }
    if let Some(v) = copied(matches, "port") {
        config.port = Some(v);
    }
    if let Some(v) = string(matches, "database") {
        config.database = Some(v);
    }
    if let Some(v) = string(matches, "user") {
        config.user = v;
    }
    if let Some(v) = string(matches, "password") {
        config.password = v;
    }

    if let Some(v) = copied(matches, "iterations") {
        config.iterations = v;
    }
    if let Some(v) = copied(matches, "table-cnt") {
        config.table_cnt = v;
    }
    if let Some(v) = copied(matches, "table-size") {
        config.table_size = v;
    }
    if let Some(v) = copied(matches, "sc-gap-us") {
        config.sc_gap_us = v;
    }
    if let Some(v) = copied(matches, "report-interval") {
        config.report_interval = v;
    }
    if let Some(v) = copied(matches, "concurrency") {
        config.concurrency = v;
    }
    if let Some(v) = copied(matches, "sleep-after-fail") {
        config.sleep_after_fail = v;
    }
    if let Some(v) = copied(matches, "qps") {
        config.target_qps = v;
    }
    if let Some(v) = copied(matches, "test-time") {
        config.test_time = v;
    }
    if let Some(v) = copied(matches, "seed") {
        config.seed = Some(v);
    }

    if let Some(v) = copied(matches, "detail-log") {
        config.detail_log = v;
    }
    if let Some(v) = copied(matches, "short-connection") {
        config.short_connection = v;
    }
    if let Some(v) = copied(matches, "skip-prepare") {
        config.skip_prepare = v;
    }
    if let Some(v) = copied(matches, "test-after-insert") {
        config.select_after_insert = v;
    }

    if let Some(v) = matches.get_one::<PathBuf>("query-file") {
        config.query_file = v.clone();
    }
    if let Some(v) = string(matches, "backend") {
        config.backend = Some(v);
    }
    if let Some(v) = string(matches, "table-prefix") {
        config.table_name_prefix = v;
    }
    if let Some(codes) = matches.get_many::<u32>("transient-errors") {
        config.transient_error_codes = codes.copied().collect();
        if config.transient_error_codes.is_empty() {
            return Err(ConfigError::invalid(
                "transient_error_codes",
                "at least one code is required",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_cli;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["mysqlsct"];
        argv.extend_from_slice(args);
        build_cli().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let m = matches(&[
            "-h", "rw", "-P", "3306", "-H", "ro", "-D", "test", "-t", "10", "-i", "5", "-s",
            "100", "-K", "--backend", "sim",
        ]);
        let (cfg, _) = load_config(&m).unwrap();
        assert_eq!(cfg.host_rw.as_deref(), Some("rw"));
        assert_eq!(cfg.table_size, 10);
        assert_eq!(cfg.iterations, 5);
        assert_eq!(cfg.sc_gap_us, 100);
        assert!(cfg.skip_prepare);
        assert_eq!(cfg.read_endpoint().unwrap().port, 3306);
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let m = matches(&["-m", "qps", "-o", "proxy", "-R", "6033", "-D", "test"]);
        let err = load_config(&m).unwrap_err();
        assert_eq!(err.problems().len(), 2);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let m = matches(&["-m", "fast"]);
        assert!(matches!(load_config(&m), Err(ConfigError::UnknownMode(_))));
    }

    #[test]
    fn test_config_file_then_flags() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
test_mode = "shortct"
host = "proxy"
port = 6033
database = "app"
concurrency = 16
backend = "sim"
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let m = matches(&["--config", &path, "-c", "2", "--query-file", "q.txt"]);
        let (cfg, backend) = load_config(&m).unwrap();
        assert_eq!(backend, Backend::Sim);
        assert_eq!(cfg.test_mode, TestMode::Churn);
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.query_file, PathBuf::from("q.txt"));
    }

    #[test]
    fn test_backend_flag_recorded_in_config() {
        let m = matches(&["-o", "proxy", "-R", "1", "-D", "d", "-m", "shortct", "--backend", "sim"]);
        let (cfg, backend) = load_config(&m).unwrap();
        assert_eq!(backend, Backend::Sim);
        assert_eq!(cfg.backend.as_deref(), Some("sim"));
        assert!(cfg.to_string().contains("backend: sim"));
    }

    #[test]
    fn test_backend_without_selection() {
        let m = matches(&["-o", "proxy", "-R", "1", "-D", "d", "-m", "shortct"]);
        let result = load_config(&m);
        if cfg!(feature = "mysql") {
            let (cfg, _) = result.unwrap();
            assert_eq!(cfg.backend.as_deref(), Some("mysql"));
        } else {
            assert!(matches!(
                result,
                Err(ConfigError::Invalid { field: "backend", .. })
            ));
        }
    }

    #[test]
    fn test_unknown_backend_in_file_rejected() {
        let cfg = TestConfig {
            backend: Some("oracle".into()),
            ..TestConfig::default()
        };
        assert!(backend(&cfg).is_err());
    }
}
