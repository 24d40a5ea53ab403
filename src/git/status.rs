//! Parsing of `git diff --name-status -z` and `git status --porcelain -z`.

use crate::git::command::zsplit;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Single-letter change codes used by git's name-status and porcelain
/// formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCode {
    Added,
    Deleted,
    Renamed,
    Modified,
    Unmerged,
    TypeChanged,
    Copied,
    Ignored,
    Untracked,
    /// Changed in the working tree but not staged
    Unstaged,
    Other(char),
}

impl StatusCode {
    pub fn from_char(c: char) -> Self {
        match c {
            'A' => StatusCode::Added,
            'D' => StatusCode::Deleted,
            'R' => StatusCode::Renamed,
            'M' => StatusCode::Modified,
            'U' => StatusCode::Unmerged,
            'T' => StatusCode::TypeChanged,
            'C' => StatusCode::Copied,
            '!' => StatusCode::Ignored,
            '?' => StatusCode::Untracked,
            ' ' => StatusCode::Unstaged,
            other => StatusCode::Other(other),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            StatusCode::Added => 'A',
            StatusCode::Deleted => 'D',
            StatusCode::Renamed => 'R',
            StatusCode::Modified => 'M',
            StatusCode::Unmerged => 'U',
            StatusCode::TypeChanged => 'T',
            StatusCode::Copied => 'C',
            StatusCode::Ignored => '!',
            StatusCode::Untracked => '?',
            StatusCode::Unstaged => ' ',
            StatusCode::Other(c) => c,
        }
    }

    /// Renames and copies carry a second path.
    fn has_second_path(self) -> bool {
        matches!(self, StatusCode::Renamed | StatusCode::Copied)
    }
}

/// One entry of a name-status diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub code: StatusCode,
    pub path: PathBuf,
    /// Destination of a rename or copy
    pub new_path: Option<PathBuf>,
}

/// Tracked changes between a reference's merge-base and the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub unmerged: Vec<PathBuf>,
}

impl GitStatus {
    /// Every path a checkout of the reference would touch.
    pub fn changed_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .chain(&self.unmerged)
    }

    /// Sort entries into the four status lists.
    ///
    /// A rename counts as removal of the old path plus addition of the new
    /// one. Type changes count as modifications. Copies and codes outside
    /// the tracked set are dropped. Paths are resolved against `workdir`
    /// only to skip symlinks that point at directories.
    pub fn classify(entries: Vec<StatusEntry>, workdir: &Path) -> Self {
        let mut status = GitStatus::default();
        for entry in entries {
            if is_symlink_to_dir(&workdir.join(&entry.path)) {
                debug!(
                    path = %entry.path.display(),
                    "skipping symlink to a directory"
                );
                continue;
            }
            match entry.code {
                StatusCode::Added => status.added.push(entry.path),
                StatusCode::Modified | StatusCode::TypeChanged => status.modified.push(entry.path),
                StatusCode::Deleted => status.removed.push(entry.path),
                StatusCode::Unmerged => status.unmerged.push(entry.path),
                StatusCode::Renamed => {
                    status.removed.push(entry.path);
                    status.added.extend(entry.new_path);
                }
                other => debug!(
                    code = %other.as_char(),
                    path = %entry.path.display(),
                    "ignoring status entry"
                ),
            }
        }
        status
    }
}

fn is_symlink_to_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
        && path.is_dir()
}

/// Parse `git diff --name-status -z` output.
///
/// The stream alternates code and path tokens; rename and copy codes carry
/// a similarity score (`R087`) and are followed by two paths.
pub fn parse_name_status(output: &str) -> Vec<StatusEntry> {
    let tokens = zsplit(output);
    let mut entries = Vec::new();
    let mut i = 0;
    while i + 1 < tokens.len() {
        let raw = tokens[i];
        let Some(first) = raw.chars().next().filter(|c| !c.is_whitespace()) else {
            i += 1;
            continue;
        };
        let code = StatusCode::from_char(first);
        let path = PathBuf::from(tokens[i + 1]);

        if code.has_second_path() {
            let new_path = tokens.get(i + 2).map(PathBuf::from);
            entries.push(StatusEntry {
                code,
                path,
                new_path,
            });
            i += 3;
        } else {
            entries.push(StatusEntry {
                code,
                path,
                new_path: None,
            });
            i += 2;
        }
    }
    entries
}

/// Working-tree dirty paths keyed by the first porcelain status character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyPaths {
    by_status: BTreeMap<char, Vec<PathBuf>>,
}

impl DirtyPaths {
    /// Parse `git status --porcelain -z` output. Paths are relative to the
    /// repository root.
    pub fn parse(output: &str) -> Self {
        let mut by_status: BTreeMap<char, Vec<PathBuf>> = BTreeMap::new();
        let mut tokens = zsplit(output).into_iter();
        while let Some(line) = tokens.next() {
            let mut chars = line.chars();
            let (Some(x), Some(y)) = (chars.next(), chars.next()) else {
                continue;
            };
            let path = line.get(3..).unwrap_or_default();
            by_status.entry(x).or_default().push(PathBuf::from(path));

            // Renames and copies are followed by their source path.
            if matches!(x, 'R' | 'C') || matches!(y, 'R' | 'C') {
                tokens.next();
            }
        }
        Self { by_status }
    }

    pub fn get(&self, code: StatusCode) -> &[PathBuf] {
        self.by_status
            .get(&code.as_char())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn untracked(&self) -> &[PathBuf] {
        self.get(StatusCode::Untracked)
    }

    /// Paths with staged or unstaged changes to tracked files.
    pub fn tracked_changes(&self) -> Vec<PathBuf> {
        self.by_status
            .iter()
            .filter(|(code, _)| !matches!(**code, '?' | '!'))
            .flat_map(|(_, paths)| paths.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_status_with_rename() {
        let output = "M\0src/a.rs\0R087\0old.rs\0new.rs\0A\0added.rs\0D\0gone.rs\0U\0conflict.rs\0";
        let entries = parse_name_status(output);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[1].code, StatusCode::Renamed);
        assert_eq!(entries[1].new_path, Some(PathBuf::from("new.rs")));

        let dir = tempfile::tempdir().unwrap();
        let status = GitStatus::classify(entries, dir.path());
        assert_eq!(status.modified, vec![PathBuf::from("src/a.rs")]);
        assert_eq!(
            status.added,
            vec![PathBuf::from("new.rs"), PathBuf::from("added.rs")]
        );
        assert_eq!(
            status.removed,
            vec![PathBuf::from("old.rs"), PathBuf::from("gone.rs")]
        );
        assert_eq!(status.unmerged, vec![PathBuf::from("conflict.rs")]);
    }

    #[test]
    fn test_copies_consume_both_paths() {
        let entries = parse_name_status("C100\0a.rs\0b.rs\0T\0link\0");
        let dir = tempfile::tempdir().unwrap();
        let status = GitStatus::classify(entries, dir.path());
        assert!(status.added.is_empty());
        assert_eq!(status.modified, vec![PathBuf::from("link")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let entries = parse_name_status("A\0alias\0A\0file.txt\0");
        let status = GitStatus::classify(entries, dir.path());
        assert_eq!(status.added, vec![PathBuf::from("file.txt")]);
    }

    #[test]
    fn test_dirty_paths_porcelain() {
        let output = " M tracked.txt\0?? new.txt\0R  moved.txt\0orig.txt\0MM both.txt\0";
        let dirty = DirtyPaths::parse(output);

        assert_eq!(dirty.untracked(), &[PathBuf::from("new.txt")]);
        assert_eq!(dirty.get(StatusCode::Unstaged), &[PathBuf::from("tracked.txt")]);
        assert_eq!(dirty.get(StatusCode::Renamed), &[PathBuf::from("moved.txt")]);
        assert_eq!(dirty.tracked_changes().len(), 3);
        assert!(!dirty.tracked_changes().contains(&PathBuf::from("orig.txt")));
    }

    #[test]
    fn test_clean_tree_has_no_dirty_paths() {
        let dirty = DirtyPaths::parse("");
        assert!(dirty.is_empty());
        assert!(dirty.tracked_changes().is_empty());
        assert!(dirty.untracked().is_empty());
    }
}
