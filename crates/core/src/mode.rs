//! Test mode selector

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which workload a run executes.
///
/// The mode is chosen once per process; every worker of a run is the same
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TestMode {
    /// Strict read-after-write consistency between the write and read node
    #[default]
    #[serde(rename = "sct", alias = "consistency")]
    Consistency,
    /// Open / execute / close cycles against a single endpoint
    #[serde(rename = "shortct", alias = "churn")]
    Churn,
    /// Statement-list execution held at a target queries-per-second
    #[serde(rename = "qps", alias = "remain_qps", alias = "throughput")]
    ThrottledLoad,
}

impl TestMode {
    /// Every supported mode.
    pub const ALL: [TestMode; 3] = [
        TestMode::Consistency,
        TestMode::Churn,
        TestMode::ThrottledLoad,
    ];

    /// The command-line name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Consistency => "sct",
            TestMode::Churn => "shortct",
            TestMode::ThrottledLoad => "qps",
        }
    }

    /// Whether the run is bounded by wall-clock time instead of iterations.
    pub fn is_time_bounded(&self) -> bool {
        matches!(self, TestMode::ThrottledLoad)
    }

    /// Whether workers execute the statement list loaded from the query file.
    pub fn uses_query_list(&self) -> bool {
        matches!(self, TestMode::Churn | TestMode::ThrottledLoad)
    }

    /// Labels used in progress lines: (rate, failed rate).
    pub fn rate_labels(&self) -> (&'static str, &'static str) {
        match self {
            TestMode::Consistency => ("Strict consistency tps", "failed tps"),
            TestMode::Churn => ("cd(connect/disconnect)ps", "failed cdps"),
            TestMode::ThrottledLoad => ("qps", "failed qps"),
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sct" | "consistency" => Ok(TestMode::Consistency),
            "shortct" | "short_connect" | "churn" => Ok(TestMode::Churn),
            "qps" | "remain_qps" | "throughput" => Ok(TestMode::ThrottledLoad),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_case_insensitive() {
        assert_eq!("SCT".parse::<TestMode>().unwrap(), TestMode::Consistency);
        assert_eq!("shortct".parse::<TestMode>().unwrap(), TestMode::Churn);
        assert_eq!(
            "Remain_QPS".parse::<TestMode>().unwrap(),
            TestMode::ThrottledLoad
        );
    }

    #[test]
    fn test_parse_descriptive_aliases() {
        assert_eq!(
            "throughput".parse::<TestMode>().unwrap(),
            TestMode::ThrottledLoad
        );
        assert_eq!("Churn".parse::<TestMode>().unwrap(), TestMode::Churn);
        assert_eq!(
            "consistency".parse::<TestMode>().unwrap(),
            TestMode::Consistency
        );
    }

    #[test]
    fn test_config_file_accepts_aliases() {
        #[derive(Deserialize)]
        struct Doc {
            test_mode: TestMode,
        }
        let doc: Doc = toml::from_str("test_mode = \"throughput\"").unwrap();
        assert_eq!(doc.test_mode, TestMode::ThrottledLoad);
    }

    #[test]
    fn test_parse_unknown_mode() {
        let err = "shotct".parse::<TestMode>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(ref m) if m == "shotct"));
    }

    #[test]
    fn test_display_matches_cli_name() {
        for mode in TestMode::ALL {
            assert_eq!(mode.to_string().parse::<TestMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_only_throughput_is_time_bounded() {
        assert!(!TestMode::Consistency.is_time_bounded());
        assert!(!TestMode::Churn.is_time_bounded());
        assert!(TestMode::ThrottledLoad.is_time_bounded());
    }
}
