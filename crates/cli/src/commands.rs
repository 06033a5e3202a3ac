//! Clap command tree definition.
//!
//! Short flags follow the classic mysqlsct tool, which claims `-h` for the
//! write host and `-v` for the version. Help is therefore only `--help`.

use clap::builder::{BoolishValueParser, PossibleValuesParser};
use clap::{value_parser, Arg, ArgAction, Command};

/// Backends compiled into this binary.
#[cfg(feature = "mysql")]
pub const BACKENDS: &[&str] = &["mysql", "sim"];
/// Backends compiled into this binary.
#[cfg(not(feature = "mysql"))]
pub const BACKENDS: &[&str] = &["sim"];

fn text(id: &'static str, short: Option<char>, help: &'static str) -> Arg {
    let arg = Arg::new(id).long(id).help(help).action(ArgAction::Set);
    match short {
        Some(c) => arg.short(c),
        None => arg,
    }
}

fn port(id: &'static str, short: char, help: &'static str) -> Arg {
    text(id, Some(short), help).value_parser(value_parser!(u16))
}

fn number(id: &'static str, short: Option<char>, help: &'static str) -> Arg {
    text(id, short, help).value_parser(value_parser!(u64))
}

/// Boolean option: `-S`, `-S 1`, `--short-connection=false` all work.
fn toggle(id: &'static str, short: char, help: &'static str) -> Arg {
    text(id, Some(short), help)
        .num_args(0..=1)
        .default_missing_value("true")
        .value_parser(BoolishValueParser::new())
}

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("mysqlsct")
        .about("Strict-consistency, connection-churn and QPS test harness for MySQL primary/replica setups")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("help")
                .long("help")
                .help("Print help")
                .action(ArgAction::Help),
        )
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Print version")
                .action(ArgAction::Version),
        )
        .arg(
            text("config", None, "TOML file with default settings; flags override it")
                .value_parser(value_parser!(std::path::PathBuf)),
        )
        .arg(text("test-mode", Some('m'), "Test mode: sct, shortct or qps"))
        .arg(text("host-rw", Some('h'), "Write node host (sct)"))
        .arg(port("port-rw", 'P', "Write node port (sct)"))
        .arg(text("host-ro", Some('H'), "Read node host (sct)"))
        .arg(port("port-ro", 'O', "Read node port (sct, default: port-rw)"))
        .arg(text("host", Some('o'), "Endpoint host (shortct, qps)"))
        .arg(port("port", 'R', "Endpoint port (shortct, qps)"))
        .arg(text("database", Some('D'), "Database holding the test tables"))
        .arg(text("user", Some('u'), "Login user"))
        .arg(text("password", Some('p'), "Login password"))
        .arg(number("iterations", Some('i'), "Total iterations across all workers"))
        .arg(
            text("table-cnt", Some('T'), "Number of tables to test")
                .value_parser(value_parser!(u32)),
        )
        .arg(number("table-size", Some('t'), "Rows per table"))
        .arg(number("sc-gap-us", Some('s'), "Delay between write and read, microseconds"))
        .arg(number("report-interval", Some('r'), "Seconds between progress lines, 0 to disable"))
        .arg(toggle("detail-log", 'k', "Log every failure with full diagnostics"))
        .arg(
            text("concurrency", Some('c'), "Worker threads")
                .value_parser(value_parser!(usize)),
        )
        .arg(toggle("short-connection", 'S', "Reconnect on every iteration"))
        .arg(toggle("skip-prepare", 'K', "Reuse existing tables instead of recreating them"))
        .arg(number("sleep-after-fail", Some('f'), "Seconds to sleep after a consistency failure"))
        .arg(toggle("test-after-insert", 'E', "Read every inserted row back from the read node"))
        .arg(number("qps", None, "Target statements per second (qps)"))
        .arg(number("test-time", None, "Test duration in seconds (required by qps)"))
        .arg(
            text("query-file", None, "Statement list for shortct and qps")
                .value_parser(value_parser!(std::path::PathBuf)),
        )
        .arg(text("table-prefix", None, "Prefix of the per-worker table names"))
        .arg(
            text(
                "transient-errors",
                None,
                "Comma-separated error codes treated as read node unavailable",
            )
            .value_parser(value_parser!(u32))
            .value_delimiter(',')
            .action(ArgAction::Append),
        )
        .arg(number("seed", None, "Base RNG seed; worker N uses seed + N"))
        .arg(
            text(
                "backend",
                None,
                "Database client: mysql, or sim for an in-memory dry run",
            )
            .value_parser(PossibleValuesParser::new(BACKENDS.iter().copied())),
        )
}
