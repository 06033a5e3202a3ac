//! Statement-list file for churn and throughput modes.
//!
//! One statement per line. Blank lines are skipped and trailing `\r` is
//! stripped. A missing or unreadable file yields an empty list, which makes
//! every iteration a bare connect/disconnect.

use std::path::Path;
use tracing::warn;

/// Read the statement list at `path`.
pub fn load_queries(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_queries(&content),
        Err(e) => {
            warn!(target: "sct::run", path = %path.display(), error = %e,
                  "query file not readable, using an empty statement list");
            Vec::new()
        }
    }
}

/// Split file content into statements.
pub fn parse_queries(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Framed listing of the statements, printed once at startup.
pub fn render_queries(queries: &[String]) -> String {
    let mut out = String::from("------------ querys -------------\n");
    for query in queries {
        out.push_str(query);
        out.push('\n');
    }
    out.push_str("---------------------------------\n");
    out
}
