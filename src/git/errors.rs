use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with {status}\n(stdout)->{stdout}\n(stderr)->{stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error(
        "Cannot find a commit with reference '{reference}'. Possible reasons:\n\n\
         - the referenced commit does not exist\n\
         - the current working directory is not a git repository\n\
         - the git binary is not available\n\n\
         Try running `git show {reference}` to debug the issue."
    )]
    UnknownReference { reference: String },

    #[error("Found pending changes in tracked files. Baseline scans require a clean git state: {}", display_paths(.paths))]
    PendingChanges { paths: Vec<PathBuf> },

    #[error(
        "Found files that are untracked by git but exist in {reference}. \
         Running a baseline scan would overwrite them, so aborting. \
         Please commit or stash your untracked changes in these paths: {}",
        display_paths(.paths)
    )]
    UntrackedConflict {
        reference: String,
        paths: Vec<PathBuf>,
    },

    #[error("failed to remove {path} before baseline checkout: {source}")]
    RemoveAdded {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Fatal error restoring Git state; please restore your repository state manually:\n{stderr}")]
    RestoreFailed { stderr: String },

    #[error("Error initializing baseline: {0}")]
    Git(#[from] GitError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
