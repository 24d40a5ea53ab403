//! Baseline snapshot manager.
//!
//! Everything here shells out to `git` through [`GitRunner`], which bounds
//! every call with a timeout. Nothing is retried: a failed mutation of the
//! working tree is surfaced, never papered over.

pub mod baseline;
pub mod command;
pub mod errors;
pub mod log;
pub mod status;

pub use baseline::{BaselineGuard, BaselineHandler};
pub use command::{GitOutput, GitRunner, DEFAULT_GIT_TIMEOUT};
pub use errors::{BaselineError, GitError};
pub use log::{log_baseline_commits, BaselineLog};
pub use status::{parse_name_status, DirtyPaths, GitStatus, StatusCode, StatusEntry};
