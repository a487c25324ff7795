// src/runner.rs

use crate::command::ExternalCommand;
use crate::config::RunnerConfig;
use crate::error::{HarnessError, Result};
use crate::model::Measurement;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Runs a target's test suite in the three modes the measurement needs
pub trait SuiteRunner {
    /// Deletes coverage artifacts left over from earlier runs
    fn cleanup(&mut self) -> Result<()>;

    /// Rebuilds the coverage-mapping database. Best effort: failures are logged.
    fn build_coverage(&mut self);

    /// Full suite, no selection
    fn run_baseline(&mut self) -> Result<Duration>;

    /// Suite with selection against the database; also returns the selected test count if known
    fn run_selected(&mut self) -> Result<(Duration, Option<usize>)>;
}

/// Runs the coverage pass and both timed passes, in that order
pub fn measure<S: SuiteRunner + ?Sized>(runner: &mut S) -> Result<Measurement> {
    runner.build_coverage();

    let baseline = runner.run_baseline()?;
    info!("Time taken to run tests without RTS: {:.3}s", baseline.as_secs_f64());

    let (selected, selected_tests) = runner.run_selected()?;
    info!("Time taken to run tests with RTS: {:.3}s", selected.as_secs_f64());

    Ok(Measurement { baseline, selected, selected_tests })
}

/// Drives the configured external test-runner commands inside a target folder
pub struct CommandSuiteRunner {
    root: PathBuf,
    tests: PathBuf,
    config: RunnerConfig,
}

impl CommandSuiteRunner {
    pub fn new(root: impl AsRef<Path>, tests: impl AsRef<Path>, config: RunnerConfig) -> Self {
        Self { root: root.as_ref().to_path_buf(), tests: tests.as_ref().to_path_buf(), config }
    }

    /// Database name the selected pass reads
    fn active_db(&self) -> &str {
        self.config.rename_db_to.as_deref().unwrap_or(&self.config.coverage_db)
    }

    fn command(&self, template: &[String], db: &str) -> Result<ExternalCommand> {
        let tests = self.tests.to_string_lossy();
        let report = self.config.report_file.as_deref().unwrap_or("");
        let argv = template
            .iter()
            .map(|arg| arg.replace("{tests}", &tests).replace("{db}", db).replace("{report}", report))
            .collect::<Vec<_>>();
        ExternalCommand::from_argv(&argv, &self.root).ok_or_else(|| HarnessError::CommandFailed {
            command: String::new(),
            status: -1,
            stderr: "empty test-runner command".to_string(),
        })
    }

    fn remove_if_present(&self, name: &str) -> Result<()> {
        let path = self.root.join(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HarnessError::io(path, e)),
        }
    }

    fn selected_test_count(&self) -> Option<usize> {
        let report = self.root.join(self.config.report_file.as_ref()?);
        match read_report_count(&report) {
            Ok(count) => count,
            Err(e) => {
                warn!("could not read test report {}: {}", report.display(), e);
                None
            }
        }
    }
}

impl SuiteRunner for CommandSuiteRunner {
    fn cleanup(&mut self) -> Result<()> {
        info!("Cleaning up the coverage db...");
        self.remove_if_present(&self.config.coverage_db)?;
        if let Some(renamed) = &self.config.rename_db_to {
            self.remove_if_present(renamed)?;
        }
        Ok(())
    }

    fn build_coverage(&mut self) {
        info!("Running test suite and generating coverage db at {}", self.root.display());
        let result = self
            .command(&self.config.coverage_command, &self.config.coverage_db)
            .and_then(|cmd| cmd.accepting(&self.config.accepted_exit_codes));
        if let Err(e) = result {
            warn!("coverage pass failed: {}", e);
            return;
        }

        if let Some(renamed) = &self.config.rename_db_to {
            let from = self.root.join(&self.config.coverage_db);
            if let Err(e) = fs::rename(&from, self.root.join(renamed)) {
                warn!("could not rename {} to {}: {}", from.display(), renamed, e);
            }
        }
    }

    fn run_baseline(&mut self) -> Result<Duration> {
        let cmd = self.command(&self.config.baseline_command, self.active_db())?;
        let output = cmd.accepting(&self.config.accepted_exit_codes)?;
        Ok(output.elapsed)
    }

    fn run_selected(&mut self) -> Result<(Duration, Option<usize>)> {
        if let Some(report) = &self.config.report_file {
            self.remove_if_present(report)?;
        }
        let cmd = self.command(&self.config.selected_command, self.active_db())?;
        let output = cmd.accepting(&self.config.accepted_exit_codes)?;
        Ok((output.elapsed, self.selected_test_count()))
    }
}

/// Reads the executed-test count from a pytest-json-report file
fn read_report_count(path: &Path) -> Result<Option<usize>> {
    let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let report: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| HarnessError::Report { path: path.to_path_buf(), message: e.to_string() })?;
    let summary = &report["summary"];
    let count = summary["total"].as_u64().or_else(|| summary["collected"].as_u64());
    Ok(count.map(|c| c as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        calls: Vec<&'static str>,
    }

    impl SuiteRunner for Fixed {
        fn cleanup(&mut self) -> Result<()> {
            Ok(())
        }
        fn build_coverage(&mut self) {
            self.calls.push("coverage");
        }
        fn run_baseline(&mut self) -> Result<Duration> {
            self.calls.push("baseline");
            Ok(Duration::from_secs(10))
        }
        fn run_selected(&mut self) -> Result<(Duration, Option<usize>)> {
            self.calls.push("selected");
            Ok((Duration::from_secs(4), Some(3)))
        }
    }

    #[test]
    fn test_measure_runs_passes_in_order() {
        let mut runner = Fixed { calls: Vec::new() };
        let m = measure(&mut runner).unwrap();
        assert_eq!(runner.calls, vec!["coverage", "baseline", "selected"]);
        assert_eq!(m.baseline, Duration::from_secs(10));
        assert_eq!(m.selected_tests, Some(3));
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let config = RunnerConfig { rename_db_to: Some("mapping.db".into()), ..RunnerConfig::default() };
        let runner = CommandSuiteRunner::new("/tmp/project", "tests/unit", config);
        let cmd = runner.command(&runner.config.selected_command, runner.active_db()).unwrap();
        assert_eq!(cmd.display(), "pytest -q --rts --rts-coverage-db=mapping.db tests/unit");
    }

    #[test]
    fn test_cleanup_removes_databases() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".coverage"), b"db").unwrap();
        fs::write(dir.path().join("mapping.db"), b"db").unwrap();
        let config = RunnerConfig { rename_db_to: Some("mapping.db".into()), ..RunnerConfig::default() };
        let mut runner = CommandSuiteRunner::new(dir.path(), "tests", config);

        runner.cleanup().unwrap();
        assert!(!dir.path().join(".coverage").exists());
        assert!(!dir.path().join("mapping.db").exists());
        // Nothing left to delete is fine
        runner.cleanup().unwrap();
    }

    #[test]
    fn test_report_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        fs::write(&path, r#"{"summary": {"passed": 4, "total": 5, "collected": 9}}"#).unwrap();
        assert_eq!(read_report_count(&path).unwrap(), Some(5));

        fs::write(&path, r#"{"summary": {"collected": 0}}"#).unwrap();
        assert_eq!(read_report_count(&path).unwrap(), Some(0));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(read_report_count(&path), Err(HarnessError::Report { .. })));
        assert!(matches!(read_report_count(&dir.path().join("missing.json")), Err(HarnessError::Io { .. })));
    }

    #[test]
    fn test_rejected_exit_code_fails_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            baseline_command: vec!["git".into(), "not-a-git-command".into()],
            accepted_exit_codes: vec![0],
            ..RunnerConfig::default()
        };
        let mut runner = CommandSuiteRunner::new(dir.path(), "tests", config);
        assert!(matches!(runner.run_baseline(), Err(HarnessError::CommandFailed { .. })));
    }
}
