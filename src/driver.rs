// src/driver.rs

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::model::*;
use crate::runner::{measure, CommandSuiteRunner, SuiteRunner};
use crate::summary::Summary;
use crate::table::{MeasurementTable, TableLayout};
use crate::walker::{plan, CommitWalker};
use crate::workspace::{GitWorkspace, ReplayGuard, Replayer};
use indicatif::ProgressBar;
use std::path::Path;
use tracing::{error, info, warn};

/// Outcome of one target
#[derive(Debug)]
pub struct TargetReport {
    pub target: String,
    pub end: LoopEnd,
    pub rows: Vec<MeasurementRow>,
    pub summary: Summary,
}

/// Replays every step in order, timing both passes for each.
///
/// Stops early on a zero baseline without writing that iteration's row.
/// The working tree is restored after every step, whichever way it ends.
pub fn replay_loop<R, S>(
    plan: &ReplayPlan,
    replayer: &mut R,
    runner: &mut S,
    table: &mut MeasurementTable,
) -> Result<(LoopEnd, Vec<MeasurementRow>)>
where
    R: Replayer + ?Sized,
    S: SuiteRunner + ?Sized,
{
    let bar = ProgressBar::new(plan.steps.len() as u64);
    bar.set_message("Replaying commits");

    let mut rows = Vec::new();
    for step in &plan.steps {
        let guard = ReplayGuard::begin(replayer, step)?;
        let changed_files = guard.changed_files().len();
        let measurement = measure(runner)?;
        guard.finish()?;

        if measurement.is_degenerate() {
            warn!("Time taken is 0 on iteration {}, abandoning remaining commits", step.iteration);
            bar.abandon_with_message("Degenerate timing");
            return Ok((LoopEnd::DegenerateTiming { iteration: step.iteration }, rows));
        }

        let row = MeasurementRow::new(step.iteration, &measurement, changed_files);
        info!("Gain of time: {:.3}s, ratio: {:.3}", row.saved, row.ratio);
        table.append(&row)?;
        rows.push(row);
        bar.inc(1);
    }
    bar.finish_with_message("Replay complete");

    if plan.exhausted {
        info!("No more commits to check");
        Ok((LoopEnd::Exhausted, rows))
    } else {
        Ok((LoopEnd::Completed, rows))
    }
}

/// Computes the summary over this run's rows and overwrites `summary_path`
pub fn finalize(target: &str, table: &MeasurementTable, summary_path: &Path) -> Result<Summary> {
    let summary = Summary::from_table(target, table.path(), table.rows_before_run())?;
    summary.write(summary_path)?;
    info!(
        "{}: {} rows, average {:.3}s without RTS, {:.3}s with RTS, ratio {:.3}",
        summary.target, summary.rows, summary.average_time_without_rts, summary.average_time_with_rts, summary.average_ratio
    );
    Ok(summary)
}

/// Cleans coverage artifacts, replays the plan and writes the summary.
///
/// When the loop aborts on an error, the rows written before it are still
/// summarized and then the error is returned.
pub fn execute<R, S>(
    target: &Target,
    plan: &ReplayPlan,
    replayer: &mut R,
    runner: &mut S,
    table: &mut MeasurementTable,
    summary_path: &Path,
) -> Result<TargetReport>
where
    R: Replayer + ?Sized,
    S: SuiteRunner + ?Sized,
{
    runner.cleanup()?;
    let (end, rows) = match replay_loop(plan, replayer, runner, table) {
        Ok(outcome) => outcome,
        Err(e) => {
            if table.rows_written() > 0 {
                match finalize(&target.name, table, summary_path) {
                    Ok(partial) => warn!("{} aborted after {} rows; summary covers those rows", target.name, partial.rows),
                    Err(fe) => warn!("{} aborted and its partial summary failed: {}", target.name, fe),
                }
            }
            return Err(e);
        }
    };
    let summary = finalize(&target.name, table, summary_path)?;
    Ok(TargetReport { target: target.name.clone(), end, rows, summary })
}

/// Runs targets one after another against git and the configured test runner
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn run_target(&self, target: &Target) -> Result<TargetReport> {
        let policy = self.config.walk.policy;
        info!("Measuring {} ({:?}, up to {} commits on {})", target.name, policy, target.max_commits, target.branch);

        let walker = CommitWalker::open(&target.folder)?;
        let window = walker.walk(&target.branch, target.max_commits, policy)?;
        let plan = plan(&window, policy);

        let mut workspace = GitWorkspace::new(&target.folder, &target.branch, policy);
        let mut runner = CommandSuiteRunner::new(&target.folder, &target.tests, self.config.runner.clone());

        let output = &self.config.output;
        let layout = TableLayout { track_selected: self.config.runner.report_file.is_some() };
        let table_path = output.table_mode.path_for(&output.table, &target.name);
        let mut table = MeasurementTable::open(&table_path, output.table_mode, layout)?;

        execute(target, &plan, &mut workspace, &mut runner, &mut table, &output.summary)
    }

    /// A failed target is logged and does not stop the ones after it
    pub fn run_all(&self, targets: &[Target]) -> Vec<(String, Result<TargetReport>)> {
        targets
            .iter()
            .map(|target| {
                let result = self.run_target(target);
                if let Err(e) = &result {
                    error!("Target {} failed: {}", target.name, e);
                }
                (target.name.clone(), result)
            })
            .collect()
    }
}
