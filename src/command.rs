// src/command.rs

//! Blocking invocation of external tools (git, the test runner).
//!
//! Every call runs in an explicit working directory and hands back its exit
//! status, so callers decide what a failure means.

use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self { program: program.into(), args: Vec::new(), dir: dir.as_ref().to_path_buf() }
    }

    /// Builds a command from an argv, e.g. a configured test-runner line
    pub fn from_argv(argv: &[String], dir: impl AsRef<Path>) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), dir).args(args.iter().cloned()))
    }

    pub fn git(dir: impl AsRef<Path>) -> Self {
        Self::new("git", dir)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Human-readable command line, used in logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs to completion and reports the status without judging it.
    /// The timer brackets only the blocking wait on the child.
    pub fn output(&self) -> Result<CommandOutput> {
        debug!(command = %self.display(), dir = %self.dir.display(), "running");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.dir);

        let start = Instant::now();
        let output = cmd.output().map_err(|source| HarnessError::Spawn { command: self.display(), source })?;
        let elapsed = start.elapsed();

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed,
        })
    }

    /// Runs and fails on any non-zero exit status
    pub fn checked(&self) -> Result<CommandOutput> {
        self.accepting(&[0])
    }

    /// Runs and fails unless the exit status is one of `accepted`
    pub fn accepting(&self, accepted: &[i32]) -> Result<CommandOutput> {
        let output = self.output()?;
        match output.status {
            Some(code) if accepted.contains(&code) => Ok(output),
            status => Err(HarnessError::CommandFailed {
                command: self.display(),
                status: status.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }
}
