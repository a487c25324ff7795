// src/workspace.rs

//! The target's working tree, the one piece of shared mutable state.
//!
//! At most one replay is live at a time. A [`ReplayGuard`] holds it and puts
//! the tree back on the branch when the guard finishes or is dropped.

use crate::command::ExternalCommand;
use crate::error::Result;
use crate::model::{ReplayStep, WalkPolicy};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Moves a working tree to replayed states and back
pub trait Replayer {
    /// Checks out `step.base`, applies `step.pick` on top and returns the changed paths
    fn replay(&mut self, step: &ReplayStep) -> Result<Vec<String>>;

    /// Returns the tree to a clean checkout of the primary branch
    fn restore(&mut self) -> Result<()>;
}

/// Replays commits with the git command line
pub struct GitWorkspace {
    root: PathBuf,
    branch: String,
    stage_only: bool,
}

impl GitWorkspace {
    pub fn new(root: impl AsRef<Path>, branch: impl Into<String>, policy: WalkPolicy) -> Self {
        Self { root: root.as_ref().to_path_buf(), branch: branch.into(), stage_only: policy.stages_only() }
    }

    fn git(&self) -> ExternalCommand {
        ExternalCommand::git(&self.root)
    }

    fn checkout(&self, commit: &str) -> Result<()> {
        self.git().args(["reset", "--hard"]).checked()?;
        self.git().args(["checkout", "--force", "--detach", commit]).checked()?;
        Ok(())
    }

    fn cherry_pick(&self, commit: &str, is_merge: bool) -> Result<()> {
        let mut pick = self.git().arg("cherry-pick");
        if self.stage_only {
            pick = pick.arg("--no-commit");
        } else {
            // Neighbours in time order need not be parent and child, so a pick may apply as empty
            pick = pick.arg("--keep-redundant-commits");
        }
        if is_merge {
            pick = pick.args(["-m", "1"]);
        }
        match pick.arg(commit).checked() {
            Ok(_) => Ok(()),
            Err(err) => {
                // Leave no half-applied pick behind; the guard resets the rest
                if let Err(abort) = self.git().args(["cherry-pick", "--abort"]).checked() {
                    debug!("cherry-pick --abort: {}", abort);
                }
                Err(err)
            }
        }
    }

    /// Paths that differ between the working tree (index included) and `reference`
    pub fn changed_files(&self, reference: &str) -> Result<Vec<String>> {
        let output = self.git().args(["diff", "--name-only", reference]).checked()?;
        Ok(output.stdout.lines().filter(|l| !l.is_empty()).map(String::from).collect())
    }
}

impl Replayer for GitWorkspace {
    fn replay(&mut self, step: &ReplayStep) -> Result<Vec<String>> {
        info!("Iter: {}, Commit id: {}", step.iteration, step.base);
        self.checkout(&step.base)?;
        self.cherry_pick(&step.pick, step.pick_is_merge)?;
        info!("Applied commit {}", step.pick);

        let changed = self.changed_files(&step.base)?;
        for path in &changed {
            debug!("changed: {}", path);
        }
        Ok(changed)
    }

    fn restore(&mut self) -> Result<()> {
        self.git().args(["reset", "--hard"]).checked()?;
        self.git().arg("reset").checked()?;
        self.git().args(["checkout", "--force", self.branch.as_str()]).checked()?;
        Ok(())
    }
}

/// A live replay. Call [`ReplayGuard::finish`] to restore and see the result;
/// dropping an unfinished guard restores and only logs failures.
pub struct ReplayGuard<'a, R: Replayer + ?Sized> {
    replayer: &'a mut R,
    changed: Vec<String>,
    restored: bool,
}

impl<'a, R: Replayer + ?Sized> ReplayGuard<'a, R> {
    pub fn begin(replayer: &'a mut R, step: &ReplayStep) -> Result<Self> {
        let mut guard = Self { replayer, changed: Vec::new(), restored: false };
        // On failure the guard drops here and restores the tree
        guard.changed = guard.replayer.replay(step)?;
        Ok(guard)
    }

    pub fn changed_files(&self) -> &[String] {
        &self.changed
    }

    pub fn finish(mut self) -> Result<()> {
        self.restored = true;
        self.replayer.restore()
    }
}

impl<R: Replayer + ?Sized> Drop for ReplayGuard<'_, R> {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(err) = self.replayer.restore() {
                warn!("failed to restore working tree: {}", err);
            }
        }
    }
}
