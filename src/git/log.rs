use crate::git::command::GitRunner;
use crate::git::errors::GitError;
use tracing::{debug, info, warn};

/// Which commits a baseline comparison covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineLog {
    pub reference_commit: String,
    pub merge_base: String,
    /// `git log --oneline --graph` of merge-base..HEAD
    pub introduced: String,
    /// Commits on the baseline branch the current branch lacks, when the
    /// reference is not an ancestor of HEAD
    pub missing: Option<String>,
}

impl BaselineLog {
    pub fn collect(runner: &GitRunner, reference: &str) -> Result<Self, GitError> {
        let reference_commit = runner.run_trimmed(&["rev-parse", reference])?;
        let merge_base = runner.run_trimmed(&["merge-base", reference, "HEAD"])?;

        let oneline = |range: String| -> Result<String, GitError> {
            Ok(runner
                .run(&["log", "--oneline", "--graph", &range])?
                .stdout
                .trim_end()
                .to_string())
        };

        let introduced = oneline(format!("{merge_base}..HEAD"))?;
        let missing = if merge_base != reference_commit {
            Some(oneline(format!("{merge_base}..{reference_commit}"))?)
        } else {
            None
        };

        Ok(Self {
            reference_commit,
            merge_base,
            introduced,
            missing,
        })
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Log the commits whose findings will be reported, and warn when the
/// baseline branch has moved on since the merge-base. Failures are logged
/// at debug level and otherwise ignored.
pub fn log_baseline_commits(runner: &GitRunner, reference: &str) {
    let log = match BaselineLog::collect(runner, reference) {
        Ok(log) => log,
        Err(e) => {
            debug!("could not summarize baseline commits: {e}");
            return;
        }
    };

    info!("  Will report findings introduced by these commits:");
    info!("{}", indent(&log.introduced));

    if let Some(missing) = &log.missing {
        warn!("  The current branch is missing these commits from the baseline branch:");
        info!("{}", indent(missing));
        info!("  Any finding these commits fixed will look like a new finding in the current branch.");
        info!(
            "  To avoid reporting such findings, compare to the branch-off point with:\n    \
             --ref=$(git merge-base {reference} HEAD)"
        );
    }
}
