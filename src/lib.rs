//! fixbase: result handling for a static-analysis pipeline
//!
//! Two independent subsystems that both mutate a working tree and must stay
//! correct under partial failure:
//!
//! - [`autofix`] rewrites source files in place to apply the fixes carried
//!   by match records, tracking positional drift so later edits in a file
//!   land where they should.
//! - [`git`] rewinds the working tree to a baseline commit for a comparison
//!   scan and restores it afterwards, even if the scan fails.
//!
//! # Safety
//!
//! - Files are rewritten atomically (tempfile + fsync + rename)
//! - A rewrite verifies the file still holds the text the fix was computed from
//! - Baseline swaps refuse to start on a dirty tree or when an untracked file
//!   would be overwritten
//! - Every git invocation is bounded by a timeout
//!
//! # Example
//!
//! ```no_run
//! use fixbase::{apply_fixes, Position, RuleMatch, RuleMatchMap};
//!
//! let matches: RuleMatchMap = vec![
//!     RuleMatch::new("use-qux", "a.txt", Position::new(1, 1), Position::new(1, 4))
//!         .with_fix("qux"),
//! ]
//! .into_iter()
//! .collect();
//!
//! match apply_fixes(&matches, false) {
//!     Ok(report) => println!("modified {} files", report.modified_count()),
//!     Err(e) => eprintln!("fix failed: {}", e),
//! }
//! ```

pub mod autofix;
pub mod config;
pub mod edit;
pub mod git;
pub mod rule_match;

// Re-exports
pub use autofix::{apply_fixes, AutofixError, FileOffsets, FixPreview, FixReport};
pub use config::{ConfigError, GitSettings, Settings};
pub use edit::{EditError, EditResult, EditVerification, FileRewrite};
pub use git::{BaselineError, BaselineGuard, BaselineHandler, GitError, GitStatus};
pub use rule_match::{FixRegex, MatchFingerprint, Position, RuleMatch, RuleMatchError, RuleMatchMap};
