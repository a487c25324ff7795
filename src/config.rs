// src/config.rs

//! Harness settings read from rts.toml
//!
//! The file is optional and discovered by walking up from the current
//! directory. Command-line flags override whatever it sets.

use crate::model::{Target, WalkPolicy};
use crate::table::TableMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "rts.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarnessConfig {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub walk: WalkConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// A repository to replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub folder: PathBuf,
    /// Tests folder inside `folder`
    #[serde(default = "default_tests")]
    pub tests: PathBuf,
    /// Overrides `walk.branch`
    #[serde(default)]
    pub branch: Option<String>,
    /// Overrides `walk.max_commits`
    #[serde(default)]
    pub max_commits: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkConfig {
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
    #[serde(default)]
    pub policy: WalkPolicy,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self { branch: default_branch(), max_commits: default_max_commits(), policy: WalkPolicy::default() }
    }
}

/// Test-runner command lines. `{tests}`, `{db}` and `{report}` are substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_coverage_command")]
    pub coverage_command: Vec<String>,
    #[serde(default = "default_baseline_command")]
    pub baseline_command: Vec<String>,
    #[serde(default = "default_selected_command")]
    pub selected_command: Vec<String>,
    /// Database file written by the coverage pass
    #[serde(default = "default_coverage_db")]
    pub coverage_db: String,
    /// Rename the database to this name before the selected pass
    #[serde(default)]
    pub rename_db_to: Option<String>,
    /// JSON report written by the selected pass, used to count selected tests
    #[serde(default)]
    pub report_file: Option<String>,
    /// Exit codes that still count as a completed suite run
    #[serde(default = "default_accepted_exit_codes")]
    pub accepted_exit_codes: Vec<i32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            coverage_command: default_coverage_command(),
            baseline_command: default_baseline_command(),
            selected_command: default_selected_command(),
            coverage_db: default_coverage_db(),
            rename_db_to: None,
            report_file: None,
            accepted_exit_codes: default_accepted_exit_codes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Measurement table (shared mode) or directory of tables (per-target mode)
    #[serde(default = "default_table")]
    pub table: PathBuf,
    #[serde(default)]
    pub table_mode: TableMode,
    #[serde(default = "default_summary")]
    pub summary: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { table: default_table(), table_mode: TableMode::default(), summary: default_summary() }
    }
}

fn default_tests() -> PathBuf {
    PathBuf::from("tests")
}
fn default_branch() -> String {
    "master".to_string()
}
fn default_max_commits() -> usize {
    20
}
fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
fn default_coverage_command() -> Vec<String> {
    argv(&["pytest", "--cov=.", "--cov-context=test", "--cov-config=.coveragerc", "{tests}"])
}
fn default_baseline_command() -> Vec<String> {
    argv(&["pytest", "-q", "{tests}"])
}
fn default_selected_command() -> Vec<String> {
    argv(&["pytest", "-q", "--rts", "--rts-coverage-db={db}", "{tests}"])
}
fn default_coverage_db() -> String {
    ".coverage".to_string()
}
fn default_accepted_exit_codes() -> Vec<i32> {
    // pytest: all passed, some failed, nothing collected
    vec![0, 1, 5]
}
fn default_table() -> PathBuf {
    PathBuf::from("output.csv")
}
fn default_summary() -> PathBuf {
    PathBuf::from("average_statistics.csv")
}

impl HarnessConfig {
    /// Parses `path`; a missing or malformed file is an error
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Nearest rts.toml at or above `start`. `Ok(None)` when there is none;
    /// a file that exists but does not parse is reported, not skipped.
    pub fn discover_from(start: &Path) -> anyhow::Result<Option<Self>> {
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                debug!("using configuration {}", candidate.display());
                return Self::load(&candidate).map(Some);
            }
        }
        Ok(None)
    }

    /// [`HarnessConfig::discover_from`] starting at the current directory
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        Self::discover_from(&cwd)
    }

    /// Resolves configured targets against the walk defaults
    pub fn resolve_targets(&self) -> Vec<Target> {
        self.targets
            .iter()
            .map(|t| Target {
                name: target_name(&t.folder),
                folder: t.folder.clone(),
                tests: t.tests.clone(),
                branch: t.branch.clone().unwrap_or_else(|| self.walk.branch.clone()),
                max_commits: t.max_commits.unwrap_or(self.walk.max_commits),
            })
            .collect()
    }

    /// Commented template printed by `--init`
    pub fn default_toml() -> String {
        r#"# rts-savings configuration

[[targets]]
folder = "my-project"
tests = "tests"
# branch = "main"
# max_commits = 10

[walk]
# Primary branch of every target
branch = "master"
# Commits examined per target
max_commits = 20
# "newest-pairs" or "oldest-window"
policy = "newest-pairs"

[runner]
coverage_command = ["pytest", "--cov=.", "--cov-context=test", "--cov-config=.coveragerc", "{tests}"]
baseline_command = ["pytest", "-q", "{tests}"]
selected_command = ["pytest", "-q", "--rts", "--rts-coverage-db={db}", "{tests}"]
coverage_db = ".coverage"
# rename_db_to = "mapping.db"
# Count selected tests from a pytest-json-report file (uncomment to enable)
# report_file = ".rts-report.json"
accepted_exit_codes = [0, 1, 5]

[output]
table = "output.csv"
# "shared" appends every target to one table, "per-target" writes <table>/<target>.csv
table_mode = "shared"
summary = "average_statistics.csv"
"#
        .to_string()
    }
}

/// Name recorded for a target: the last component of its folder
pub fn target_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.walk.branch, "master");
        assert_eq!(config.runner.coverage_db, ".coverage");
        assert_eq!(config.runner.accepted_exit_codes, vec![0, 1, 5]);
        assert_eq!(config.output.table_mode, TableMode::Shared);
    }

    #[test]
    fn test_default_toml_parses() {
        let config: HarnessConfig = toml::from_str(&HarnessConfig::default_toml()).unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.walk.policy, WalkPolicy::NewestPairs);
        assert_eq!(config.runner.selected_command, default_selected_command());
    }

    #[test]
    fn test_discover_walks_up_to_nearest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[walk]\nmax_commits = 4\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = HarnessConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.walk.max_commits, 4);
    }

    #[test]
    fn test_discover_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[walk\nmax_commits = ").unwrap();
        let err = HarnessConfig::discover_from(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid configuration"));
    }

    #[test]
    fn test_target_overrides_walk_defaults() {
        let toml_str = r#"
            [[targets]]
            folder = "repos/alpha"

            [[targets]]
            folder = "repos/beta"
            tests = "test"
            branch = "main"
            max_commits = 3

            [walk]
            max_commits = 7
            policy = "oldest-window"
        "#;

        let config: HarnessConfig = toml::from_str(toml_str).unwrap();
        let targets = config.resolve_targets();
        assert_eq!(targets[0].name, "alpha");
        assert_eq!(targets[0].branch, "master");
        assert_eq!(targets[0].max_commits, 7);
        assert_eq!(targets[0].tests, PathBuf::from("tests"));
        assert_eq!(targets[1].branch, "main");
        assert_eq!(targets[1].max_commits, 3);
        assert_eq!(config.walk.policy, WalkPolicy::OldestWindow);
    }
}
