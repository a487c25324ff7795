// src/model.rs

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Full hex id of a commit
pub type CommitId = String;

/// A tracked repository whose history gets replayed
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Identifier written into the summary file
    pub name: String,
    pub folder: PathBuf,
    /// Tests folder, relative to `folder`
    pub tests: PathBuf,
    pub branch: String,
    /// Upper bound on commits examined
    pub max_commits: usize,
}

/// Metadata of one commit read from the repository
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    pub id: CommitId,
    pub time: DateTime<Utc>,
    pub summary: String,
    pub is_merge: bool,
}

/// How commits are chosen and paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalkPolicy {
    /// Newest first; each commit is cherry-picked onto the commit before it
    #[default]
    NewestPairs,
    /// Oldest first over non-merge commits, picks left staged
    OldestWindow,
}

impl WalkPolicy {
    /// Whether the cherry-pick leaves the change staged instead of committing it
    pub fn stages_only(self) -> bool {
        matches!(self, WalkPolicy::OldestWindow)
    }
}

/// Commits returned by a walk, in policy order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitWindow {
    pub commits: Vec<CommitInfo>,
    /// Fewer commits existed than were requested
    pub exhausted: bool,
}

/// One replay: check out `base`, then apply `pick` on top
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStep {
    /// 1-based
    pub iteration: usize,
    pub base: CommitId,
    pub pick: CommitId,
    /// `pick` has several parents and is applied against its first one
    pub pick_is_merge: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplayPlan {
    pub steps: Vec<ReplayStep>,
    pub exhausted: bool,
}

/// Raw timings of one replayed state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub baseline: Duration,
    pub selected: Duration,
    pub selected_tests: Option<usize>,
}

impl Measurement {
    /// A zero baseline cannot produce a ratio
    pub fn is_degenerate(&self) -> bool {
        self.baseline.is_zero()
    }
}

/// One line of the measurement table
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub iteration: usize,
    pub without: f64,
    pub with: f64,
    pub changed_files: usize,
    pub selected_tests: Option<usize>,
    /// `without - with`, negative when selection costs more than it saves
    pub saved: f64,
    /// `with / without`
    pub ratio: f64,
}

impl MeasurementRow {
    /// Derives saved time and ratio. Callers must reject degenerate measurements first.
    pub fn new(iteration: usize, measurement: &Measurement, changed_files: usize) -> Self {
        Self::from_seconds(
            iteration,
            measurement.baseline.as_secs_f64(),
            measurement.selected.as_secs_f64(),
            changed_files,
            measurement.selected_tests,
        )
    }

    pub fn from_seconds(
        iteration: usize,
        without: f64,
        with: f64,
        changed_files: usize,
        selected_tests: Option<usize>,
    ) -> Self {
        Self {
            iteration,
            without,
            with,
            changed_files,
            selected_tests,
            saved: without - with,
            ratio: with / without,
        }
    }
}

/// Why the replay loop of a target stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    Completed,
    /// The history ran out before `max_commits` was reached
    Exhausted,
    /// Abort target on degenerate timing: a zero baseline stops all later iterations
    DegenerateTiming { iteration: usize },
}
