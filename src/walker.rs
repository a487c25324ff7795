// src/walker.rs

use crate::error::Result;
use crate::model::*;
use chrono::{TimeZone, Utc};
use git2::{Commit, Repository, Sort};
use std::path::Path;
use tracing::{debug, info};

/// Reads a bounded window of history from a target's primary branch
pub struct CommitWalker {
    repo: Repository,
}

impl CommitWalker {
    pub fn open(repo_path: &Path) -> Result<Self> {
        let repo = Repository::open(repo_path)?;
        Ok(Self { repo })
    }

    /// Collects up to `max` commits from `branch` in the order `policy` asks for.
    /// Running out of history sets `exhausted` and is not an error.
    pub fn walk(&self, branch: &str, max: usize, policy: WalkPolicy) -> Result<CommitWindow> {
        let tip = self.repo.revparse_single(branch)?.peel_to_commit()?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip.id())?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            if commits.len() == max {
                break;
            }
            let commit = self.repo.find_commit(oid?)?;
            let info = commit_info(&commit);
            debug!(commit = %info.id, merge = info.is_merge, "{}", info.summary);
            if policy == WalkPolicy::OldestWindow && info.is_merge {
                debug!(commit = %info.id, "skipping merge commit");
                continue;
            }
            commits.push(info);
        }

        // The window is chosen from the tip, then replayed from its oldest end
        if policy == WalkPolicy::OldestWindow {
            commits.reverse();
        }

        let exhausted = commits.len() < max;
        if let (Some(first), Some(last)) = (commits.first(), commits.last()) {
            info!(
                "Walked {} commits on {} ({} .. {}){}",
                commits.len(),
                branch,
                first.time.to_rfc2822(),
                last.time.to_rfc2822(),
                if exhausted { ", history exhausted" } else { "" }
            );
        }

        Ok(CommitWindow { commits, exhausted })
    }
}

fn commit_info(commit: &Commit) -> CommitInfo {
    let time = Utc.timestamp_opt(commit.time().seconds(), 0).single().unwrap_or_default();
    CommitInfo {
        id: commit.id().to_string(),
        time,
        summary: commit.summary().unwrap_or("").to_string(),
        is_merge: commit.parent_count() > 1,
    }
}

/// Pairs consecutive commits of a window into replay steps.
///
/// `NewestPairs` windows are newest-first, so each commit is picked onto the
/// one after it in the list. `OldestWindow` windows are oldest-first, so each
/// commit is picked onto the one before it. A window of `n` commits gives
/// `n - 1` steps; a commit with no partner marks the plan exhausted.
pub fn plan(window: &CommitWindow, policy: WalkPolicy) -> ReplayPlan {
    let pairs = window.commits.windows(2).map(|pair| match policy {
        WalkPolicy::NewestPairs => (&pair[1], &pair[0]),
        WalkPolicy::OldestWindow => (&pair[0], &pair[1]),
    });

    let steps = pairs
        .enumerate()
        .map(|(i, (base, pick))| ReplayStep {
            iteration: i + 1,
            base: base.id.clone(),
            pick: pick.id.clone(),
            pick_is_merge: pick.is_merge,
        })
        .collect::<Vec<_>>();

    let exhausted = window.exhausted || steps.is_empty();
    ReplayPlan { steps, exhausted }
}
