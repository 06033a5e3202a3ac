//! mysqlsct: strict-consistency, churn and QPS test harness.
//!
//! Usage:
//! - `mysqlsct -h RW -P 3306 -H RO -D db -u user -p pass -c 8`: strict consistency
//! - `mysqlsct -m shortct -o HOST -R PORT -D db`: connect/disconnect churn
//! - `mysqlsct -m qps -o HOST -R PORT -D db --qps 5000 --test-time 60`: throttled load
//!
//! The MySQL client is compiled in with the `mysql` feature. `--backend sim`
//! runs against an in-memory primary/replica pair instead.
//!
//! Progress lines and the final summary go to stdout, diagnostics to stderr.
//! Exit code 1 means the configuration was rejected.

mod commands;
mod options;

use std::io;
use std::process;

use anyhow::Context;
use clap::error::ErrorKind;
use sct_client::SimCluster;
use sct_core::{Connector, TestConfig};
use sct_engine::{load_queries, render_queries, Orchestrator, RunSummary};
use tracing::error;
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use options::{load_config, Backend};

fn main() {
    let matches = match build_cli().try_get_matches() {
        Ok(m) => m,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(1);
            }
        },
    };

    let (config, backend) = match load_config(&matches) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    init_logging(config.detail_log);
    println!("{}", config);

    let queries = if config.test_mode.uses_query_list() {
        let queries = load_queries(&config.query_file);
        print!("{}", render_queries(&queries));
        queries
    } else {
        Vec::new()
    };

    let result = match backend {
        Backend::Sim => {
            let cluster = SimCluster::for_config(&config);
            run(config, cluster, queries)
        }
        #[cfg(feature = "mysql")]
        Backend::Mysql => run(config, sct_client::MysqlConnector::new(), queries),
    };

    if let Err(e) = result {
        error!(target: "sct::run", error = %format!("{:#}", e), "run failed");
    }
}

/// Stderr logging, filtered by `RUST_LOG` or the detail-log switch.
fn init_logging(detail_log: bool) {
    let default = if detail_log { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_thread_names(true)
        .init();
}

fn run<C: Connector>(config: TestConfig, connector: C, queries: Vec<String>) -> anyhow::Result<RunSummary> {
    let mut orchestrator =
        Orchestrator::new(config, connector, queries).context("invalid configuration")?;
    let summary = orchestrator
        .run(io::stdout())
        .context("failed to start the worker pool")?;
    println!("{}", summary);
    Ok(summary)
}
