//! Temporarily rewinding the working tree to a baseline commit.
//!
//! A [`BaselineHandler`] is built once per scan. Construction validates
//! that the tree can be rewound safely and records which tracked paths
//! differ from the reference. [`BaselineHandler::enter`] then swaps the
//! working tree to the reference's content and hands back a
//! [`BaselineGuard`] which restores the original tree when it is
//! restored explicitly or dropped.

use crate::config::GitSettings;
use crate::git::command::GitRunner;
use crate::git::errors::{BaselineError, GitError};
use crate::git::log::{log_baseline_commits, BaselineLog};
use crate::git::status::{parse_name_status, DirtyPaths, GitStatus};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

#[derive(Debug)]
pub struct BaselineHandler {
    runner: GitRunner,
    reference: String,
    /// Working directory relative to the repository root
    prefix: PathBuf,
    status: GitStatus,
    dirty_paths: DirtyPaths,
}

impl BaselineHandler {
    /// Validate `reference` against the repository at `workdir`.
    ///
    /// Fails if the reference is not a commit, if any tracked file has
    /// pending changes, or if an untracked file would be overwritten by
    /// checking out the reference.
    pub fn new(
        workdir: impl Into<PathBuf>,
        reference: impl Into<String>,
        settings: &GitSettings,
    ) -> Result<Self, BaselineError> {
        Self::with_runner(settings.runner(workdir), reference)
    }

    pub fn with_runner(
        runner: GitRunner,
        reference: impl Into<String>,
    ) -> Result<Self, BaselineError> {
        let reference = reference.into();

        let commit = format!("{reference}^{{commit}}");
        if !runner.run_unchecked(&["cat-file", "-e", &commit])?.success() {
            return Err(BaselineError::UnknownReference { reference });
        }

        let prefix = PathBuf::from(runner.run_trimmed(&["rev-parse", "--show-prefix"])?);
        let status = read_status(&runner, &reference)?;
        let dirty_paths = read_dirty_paths(&runner)?;

        let handler = Self {
            runner,
            reference,
            prefix,
            status,
            dirty_paths,
        };
        handler.check_preconditions(&handler.dirty_paths)?;
        Ok(handler)
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn workdir(&self) -> &Path {
        self.runner.workdir()
    }

    /// Tracked changes between the reference's merge-base and the index.
    pub fn status(&self) -> &GitStatus {
        &self.status
    }

    /// Dirty paths as they were when the handler was built.
    pub fn dirty_paths(&self) -> &DirtyPaths {
        &self.dirty_paths
    }

    fn check_preconditions(&self, dirty: &DirtyPaths) -> Result<(), BaselineError> {
        let pending = dirty.tracked_changes();
        if !pending.is_empty() {
            return Err(BaselineError::PendingChanges { paths: pending });
        }

        // Porcelain paths are root-relative, diff paths are workdir-relative.
        let untracked: BTreeSet<&Path> = dirty.untracked().iter().map(PathBuf::as_path).collect();
        let conflicts: BTreeSet<PathBuf> = self
            .status
            .changed_paths()
            .filter(|path| untracked.contains(self.prefix.join(path).as_path()))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(BaselineError::UntrackedConflict {
                reference: self.reference.clone(),
                paths: conflicts.into_iter().collect(),
            });
        }
        Ok(())
    }

    /// Swap the working tree to the reference commit's content.
    ///
    /// Preconditions are checked again against a fresh status query. Paths
    /// added since the reference are deleted from the working tree before
    /// the checkout. If anything fails after the current tree was
    /// recorded, the returned error is raised only after restoration has
    /// been attempted.
    pub fn enter(&self) -> Result<BaselineGuard<'_>, BaselineError> {
        let dirty = read_dirty_paths(&self.runner)?;
        self.check_preconditions(&dirty)?;

        let tree = self.runner.run_trimmed(&["write-tree"])?;
        debug!(%tree, "recorded current tree");
        let guard = BaselineGuard {
            handler: self,
            tree,
            restored: false,
        };

        for added in &self.status.added {
            match fs::remove_file(self.workdir().join(added)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %added.display(), "was not found when trying to delete");
                }
                Err(source) => {
                    return Err(BaselineError::RemoveAdded {
                        path: added.clone(),
                        source,
                    });
                }
            }
        }

        debug!(reference = %self.reference, "checking out baseline");
        self.runner
            .run(&["checkout", &self.reference, "--", "."])?;
        Ok(guard)
    }

    /// Run `f` with the working tree swapped to the reference.
    ///
    /// The original tree is restored whether `f` returns or panics; a
    /// failed restoration is reported here and takes precedence over `f`'s
    /// value.
    pub fn run_in_baseline<T>(&self, f: impl FnOnce() -> T) -> Result<T, BaselineError> {
        let guard = self.enter()?;
        let value = f();
        guard.restore()?;
        Ok(value)
    }

    fn restore_tree(&self, tree: &str) -> Result<(), BaselineError> {
        debug!(%tree, "restoring original tree");
        let restore_err = |e: GitError| BaselineError::RestoreFailed {
            stderr: e.to_string(),
        };

        let output = self
            .runner
            .run_unchecked(&["checkout", tree, "--", "."])
            .map_err(restore_err)?;
        if !output.success() {
            // Checking out an empty tree has nothing to match "." against.
            if self.tree_is_empty(tree).map_err(restore_err)? {
                debug!("original tree is empty; nothing to check out");
            } else {
                return Err(BaselineError::RestoreFailed {
                    stderr: output.stderr,
                });
            }
        }

        // Paths deleted in both the reference and the current state may
        // already be gone.
        let workdir = self.workdir();
        let to_remove: Vec<&str> = self
            .status
            .removed
            .iter()
            .filter(|path| workdir.join(path).exists())
            .filter_map(|path| path.to_str())
            .collect();
        if !to_remove.is_empty() {
            let mut args = vec!["rm", "-f", "--"];
            args.extend(to_remove);
            match self.runner.run_unchecked(&args) {
                Ok(out) if out.success() => {}
                Ok(out) => warn!(stderr = %out.stderr.trim(), "git rm of removed paths failed"),
                Err(e) => warn!("git rm of removed paths failed: {e}"),
            }
        }
        Ok(())
    }

    fn tree_is_empty(&self, tree: &str) -> Result<bool, GitError> {
        let listing = self.runner.run(&["ls-tree", "--name-only", "-z", tree])?;
        Ok(listing.stdout.trim_matches('\0').is_empty())
    }

    /// Summarize which commits the comparison covers. See [`BaselineLog`].
    pub fn baseline_log(&self) -> Result<BaselineLog, GitError> {
        BaselineLog::collect(&self.runner, &self.reference)
    }

    /// Best-effort diagnostic logging of [`Self::baseline_log`].
    pub fn log_commits(&self) {
        log_baseline_commits(&self.runner, &self.reference);
    }
}

/// Scope guard for a swapped-out working tree.
///
/// Call [`restore`](Self::restore) to observe restoration errors. Dropping
/// the guard without restoring (early return, panic) restores anyway and
/// logs any failure.
#[must_use = "dropping the guard immediately restores the original tree"]
#[derive(Debug)]
pub struct BaselineGuard<'a> {
    handler: &'a BaselineHandler,
    tree: String,
    restored: bool,
}

impl BaselineGuard<'_> {
    /// Tree id of the working tree as it was before the swap.
    pub fn original_tree(&self) -> &str {
        &self.tree
    }

    pub fn restore(mut self) -> Result<(), BaselineError> {
        self.restored = true;
        self.handler.restore_tree(&self.tree)
    }
}

impl Drop for BaselineGuard<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if let Err(e) = self.handler.restore_tree(&self.tree) {
            error!("{e}");
        }
    }
}

fn read_status(runner: &GitRunner, reference: &str) -> Result<GitStatus, GitError> {
    let output = runner.run(&[
        "diff",
        "--cached",
        "--name-status",
        "--no-ext-diff",
        "-z",
        "--diff-filter=ACDMRTUXB",
        "--ignore-submodules",
        "--relative",
        "--merge-base",
        reference,
    ])?;
    let status = GitStatus::classify(parse_name_status(&output.stdout), runner.workdir());
    debug!(?status, "baseline status");
    Ok(status)
}

fn read_dirty_paths(runner: &GitRunner) -> Result<DirtyPaths, GitError> {
    let output = runner.run(&["status", "--porcelain", "-z", "--untracked-files=all"])?;
    let dirty = DirtyPaths::parse(&output.stdout);
    debug!(?dirty, "dirty paths");
    Ok(dirty)
}
