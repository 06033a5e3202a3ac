//! End-to-end tests of the `mysqlsct` binary against the simulated backend.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn mysqlsct(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mysqlsct"))
        .args(args)
        .args(["--backend", "sim"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn test_missing_endpoint_exits_with_one() {
    let out = mysqlsct(&["-h", "rw", "-P", "3306", "-D", "test"]);
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("host_ro"), "stderr: {}", err);
}

#[test]
fn test_bad_flag_value_exits_with_one() {
    let out = mysqlsct(&["-c", "many"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_consistency_run_prints_summary() {
    let out = mysqlsct(&[
        "-h", "rw", "-P", "3306", "-H", "ro", "-D", "test", "-u", "root", "-p", "secret", "-t",
        "10", "-i", "5", "-c", "1", "-r", "0",
    ]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.starts_with("Input parameters: "));
    assert!(!text.contains("secret"));
    assert!(text.contains("backend: sim\n"));
    assert!(text.contains("Test strict consistency cnt: 5, failed cnt: 0"), "{}", text);
}

#[test]
fn test_churn_run_reads_query_file() {
    let mut queries = NamedTempFile::new().unwrap();
    writeln!(queries, "select 1").unwrap();
    writeln!(queries, "commit").unwrap();
    let path = queries.path().to_str().unwrap().to_string();

    let out = mysqlsct(&[
        "-m", "shortct", "-o", "proxy", "-R", "6033", "-D", "test", "-i", "12", "-c", "3", "-r",
        "0", "--query-file", &path,
    ]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.contains("------------ querys -------------\nselect 1\ncommit\n"));
    assert!(text.contains("Test connection/disconnect cnt: 12, failed cnt: 0"), "{}", text);
}

#[test]
fn test_config_file_with_flag_override() {
    let mut cfg = NamedTempFile::new().unwrap();
    writeln!(
        cfg,
        r#"
host_rw = "rw"
port_rw = 3306
host_ro = "ro"
database = "test"
table_size = 10
iterations = 100
report_interval = 0
"#
    )
    .unwrap();
    let path = cfg.path().to_str().unwrap().to_string();

    let out = mysqlsct(&["--config", &path, "-i", "7"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("Test strict consistency cnt: 7, failed cnt: 0"));
}

#[cfg(not(feature = "mysql"))]
#[test]
fn test_no_silent_simulator_without_client() {
    let out = Command::new(env!("CARGO_BIN_EXE_mysqlsct"))
        .args(["-h", "10.0.0.1", "-P", "3306", "-H", "10.0.0.2", "-D", "test"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).is_empty());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("backend"), "stderr: {}", err);
}

#[test]
fn test_version() {
    let out = Command::new(env!("CARGO_BIN_EXE_mysqlsct"))
        .arg("-v")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains(env!("CARGO_PKG_VERSION")));
}
