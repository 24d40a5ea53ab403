//! Bounded `git` subprocess invocation.

use crate::git::errors::GitError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(100);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished git process.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs git in a fixed working directory with a hard time limit.
#[derive(Debug, Clone)]
pub struct GitRunner {
    binary: PathBuf,
    workdir: PathBuf,
    timeout: Duration,
}

impl GitRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("git"),
            workdir: workdir.into(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn describe(&self, args: &[&str]) -> String {
        std::iter::once(self.binary.display().to_string())
            .chain(args.iter().map(|a| a.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run git and fail on a non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        let output = self.run_unchecked(args)?;
        if !output.success() {
            return Err(GitError::Failed {
                command: self.describe(args),
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Run git and return its trimmed stdout.
    pub fn run_trimmed(&self, args: &[&str]) -> Result<String, GitError> {
        Ok(self.run(args)?.stdout.trim().to_string())
    }

    /// Run git, returning whatever it produced regardless of exit status.
    /// Spawn failures and timeouts are still errors.
    pub fn run_unchecked(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        let command = self.describe(args);
        debug!(%command, workdir = %self.workdir.display(), "running git");

        let mut child = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty child cannot
        // block on a full pipe while we wait for it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.timeout).map_err(|source| {
            GitError::Spawn {
                command: command.clone(),
                source,
            }
        })?;

        let Some(status) = status else {
            return Err(GitError::Timeout {
                command,
                timeout: self.timeout,
            });
        };

        Ok(GitOutput {
            status,
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_drain(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Wait for the child, killing it once `timeout` elapses. `None` on timeout.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Split null-delimited git output, ignoring leading/trailing separators.
pub fn zsplit(output: &str) -> Vec<&str> {
    let trimmed = output.trim_matches('\0');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('\0').collect()
    }
}
