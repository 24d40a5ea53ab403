use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Whole-file rewrite with verification of the content it was computed from.
///
/// The patch engine reads a file, splices a fix into it and hands the
/// result here. Between the read and the write the file must not change;
/// the verification catches anything that slipped in.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileRewrite does nothing until apply() is called"]
pub struct FileRewrite {
    /// File to rewrite
    pub file: PathBuf,
    /// Content the new text was derived from
    pub expected_before: EditVerification,
    /// Full replacement content
    pub new_content: String,
}

/// Verification strategy for rewrite safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large files)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("{file} changed on disk since the fix was computed")]
    ContentChanged { file: PathBuf },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    /// New content was written
    Applied { file: PathBuf, bytes_written: usize },
    /// File already holds the new content; nothing written
    AlreadyApplied { file: PathBuf },
}

impl FileRewrite {
    pub fn new(
        file: impl Into<PathBuf>,
        before: &str,
        new_content: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            expected_before: EditVerification::from_text(before),
            new_content: new_content.into(),
        }
    }

    /// Write the new content atomically.
    ///
    /// Uses tempfile + fsync + rename for crash safety.
    pub fn apply(&self) -> Result<EditResult, EditError> {
        let current = fs::read_to_string(&self.file)?;

        if current == self.new_content {
            return Ok(EditResult::AlreadyApplied {
                file: self.file.clone(),
            });
        }

        if !self.expected_before.matches(&current) {
            return Err(EditError::ContentChanged {
                file: self.file.clone(),
            });
        }

        atomic_write(&self.file, self.new_content.as_bytes())?;

        // mtime must advance even where the filesystem clock is coarse.
        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&self.file, now)?;

        Ok(EditResult::Applied {
            file: self.file.clone(),
            bytes_written: self.new_content.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file is untouched. Permissions of
/// the original file are carried over to the replacement. A symlink is
/// written through: the link stays and its target is replaced.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let resolved;
    let path = if fs::symlink_metadata(path)?.file_type().is_symlink() {
        resolved = fs::canonicalize(path)?;
        resolved.as_path()
    } else {
        path
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let permissions = fs::metadata(path)?.permissions();
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.as_file().set_permissions(permissions)?;

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::from_text("hello world");
        assert!(matches!(verify, EditVerification::ExactMatch(_)));
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash_for_large_text() {
        let text = "x".repeat(2000);
        let verify = EditVerification::from_text(&text);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert!(verify.matches(&text));
        assert!(!verify.matches("x"));
    }

    #[test]
    fn test_rewrite_applies() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("a.txt");
        fs::write(&file_path, "foo bar\n").unwrap();

        let rewrite = FileRewrite::new(&file_path, "foo bar\n", "qux bar\n");
        let result = rewrite.apply().unwrap();

        assert!(matches!(result, EditResult::Applied { bytes_written: 8, .. }));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "qux bar\n");
    }

    #[test]
    fn test_rewrite_already_applied() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("a.txt");
        fs::write(&file_path, "qux bar\n").unwrap();

        let rewrite = FileRewrite::new(&file_path, "foo bar\n", "qux bar\n");
        assert!(matches!(
            rewrite.apply().unwrap(),
            EditResult::AlreadyApplied { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_through_symlink_keeps_link() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("real.txt");
        let link = temp_dir.path().join("link.txt");
        fs::write(&target, "foo\n").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let rewrite = FileRewrite::new(&link, "foo\n", "bar\n");
        assert!(matches!(rewrite.apply().unwrap(), EditResult::Applied { .. }));

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&target).unwrap(), "bar\n");
        assert_eq!(fs::read_to_string(&link).unwrap(), "bar\n");
    }

    #[test]
    fn test_rewrite_rejects_concurrent_change() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("a.txt");
        fs::write(&file_path, "someone else wrote this\n").unwrap();

        let rewrite = FileRewrite::new(&file_path, "foo bar\n", "qux bar\n");
        assert!(matches!(
            rewrite.apply(),
            Err(EditError::ContentChanged { .. })
        ));
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "someone else wrote this\n"
        );
    }

    #[test]
    fn test_rewrite_missing_file_is_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let rewrite = FileRewrite::new(temp_dir.path().join("gone.txt"), "", "x");
        assert!(matches!(rewrite.apply(), Err(EditError::Io(_))));
    }
}
