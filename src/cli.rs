// src/cli.rs

use crate::config::{target_name, HarnessConfig};
use crate::model::{Target, WalkPolicy};
use crate::table::TableMode;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Measure the time regression test selection saves over commit history", long_about = None)]
pub struct Args {
    /// Target repositories to replay; replaces the targets of the config file
    pub targets: Vec<PathBuf>,

    /// Configuration file (default: rts.toml, discovered upwards from the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tests folder inside each positional target
    #[arg(long, default_value = "tests")]
    pub tests: PathBuf,

    /// Primary branch to walk
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Maximum number of commits to examine per target
    #[arg(short = 'n', long)]
    pub max_commits: Option<usize>,

    /// Commit selection policy
    #[arg(long, value_enum)]
    pub policy: Option<WalkPolicy>,

    /// Measurement table path (a directory with --table-mode per-target)
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// Whether targets share one table or get one each
    #[arg(long, value_enum)]
    pub table_mode: Option<TableMode>,

    /// Summary file, overwritten after every target
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// pytest-json-report file to count selected tests from
    #[arg(long)]
    pub report_file: Option<String>,

    /// Print the default configuration and exit
    #[arg(long)]
    pub init: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Folds command-line overrides into a loaded configuration
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(branch) = &self.branch {
            config.walk.branch = branch.clone();
        }
        if let Some(max) = self.max_commits {
            config.walk.max_commits = max;
        }
        if let Some(policy) = self.policy {
            config.walk.policy = policy;
        }
        if let Some(table) = &self.table {
            config.output.table = table.clone();
        }
        if let Some(mode) = self.table_mode {
            config.output.table_mode = mode;
        }
        if let Some(summary) = &self.summary {
            config.output.summary = summary.clone();
        }
        if let Some(report) = &self.report_file {
            config.runner.report_file = Some(report.clone());
        }
    }

    /// Targets to run: positional folders if given, else the configured ones
    pub fn targets(&self, config: &HarnessConfig) -> Vec<Target> {
        if self.targets.is_empty() {
            let mut targets = config.resolve_targets();
            // Explicit flags beat per-target settings from the file
            for target in &mut targets {
                if let Some(branch) = &self.branch {
                    target.branch = branch.clone();
                }
                if let Some(max) = self.max_commits {
                    target.max_commits = max;
                }
            }
            return targets;
        }

        self.targets
            .iter()
            .map(|folder| Target {
                name: target_name(folder),
                folder: folder.clone(),
                tests: self.tests.clone(),
                branch: config.walk.branch.clone(),
                max_commits: config.walk.max_commits,
            })
            .collect()
    }
}
