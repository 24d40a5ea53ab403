use crate::git::{GitRunner, DEFAULT_GIT_TIMEOUT};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Contents of `fixbase.toml`. Every field has a default, so an empty
/// file (or no file) is valid.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub git: GitSettings,
    pub fix: FixSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.git.binary.as_os_str().is_empty() {
            issues.push(ValidationIssue::Empty { field: "git.binary" });
        }
        if self.git.timeout_secs == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "git.timeout_secs",
                message: "must be at least 1 second".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GitSettings {
    /// git executable to invoke
    pub binary: PathBuf,
    /// Upper bound on every git invocation
    pub timeout_secs: u64,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("git"),
            timeout_secs: DEFAULT_GIT_TIMEOUT.as_secs(),
        }
    }
}

impl GitSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn runner(&self, workdir: impl Into<PathBuf>) -> GitRunner {
        GitRunner::new(workdir)
            .with_binary(&self.binary)
            .with_timeout(self.timeout())
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FixSettings {
    /// Print a unified diff of every file a fix pass rewrites
    pub show_diff: bool,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    Empty {
        field: &'static str,
    },
    OutOfRange {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Empty { field } => write!(f, "'{field}' must not be empty"),
            ValidationIssue::OutOfRange { field, message } => write!(f, "'{field}' {message}"),
        }
    }
}
